//! Directory-backed remote channel.
//!
//! Layout: `<root>/<user_id>/<note_id>.json`, one document per note. Any
//! process that can reach the directory (a shared drive, a synced folder)
//! acts as another device. Snapshots are produced by polling.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;

use super::{RemoteChannel, RemoteSnapshot, SnapshotReceiver, UserId};
use crate::error::Result;
use crate::models::{Note, NoteId};

/// Default interval between directory scans.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

const DOCUMENT_EXTENSION: &str = "json";

/// Remote channel storing documents as JSON files under a root directory.
#[derive(Debug, Clone)]
pub struct FsRemote {
    root: PathBuf,
    poll_interval: Duration,
}

impl FsRemote {
    /// Creates a remote rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets the interval between directory scans.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, user_id: &UserId) -> PathBuf {
        self.root.join(user_id.as_str())
    }

    fn document_path(&self, user_id: &UserId, note_id: &NoteId) -> PathBuf {
        self.collection_dir(user_id)
            .join(format!("{note_id}.{DOCUMENT_EXTENSION}"))
    }

    /// Read the whole collection for `user_id`.
    pub async fn read_snapshot(&self, user_id: &UserId) -> Result<RemoteSnapshot> {
        read_collection(&self.collection_dir(user_id)).await
    }
}

async fn read_collection(dir: &Path) -> Result<RemoteSnapshot> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            return Ok(RemoteSnapshot::default());
        }
        Err(error) => return Err(error.into()),
    };

    let mut notes = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_document = path
            .extension()
            .is_some_and(|extension| extension == DOCUMENT_EXTENSION);
        let is_hidden = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with('.'));
        if !is_document || is_hidden {
            continue;
        }

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            // Removed between listing and reading.
            Err(error) if error.kind() == ErrorKind::NotFound => continue,
            Err(error) => return Err(error.into()),
        };
        match serde_json::from_str::<Note>(&raw) {
            Ok(note) => notes.push(note),
            Err(error) => {
                tracing::warn!("Skipping unreadable document {}: {}", path.display(), error);
            }
        }
    }

    Ok(RemoteSnapshot::new(notes))
}

impl RemoteChannel for FsRemote {
    async fn subscribe(&self, user_id: &UserId) -> Result<SnapshotReceiver> {
        let dir = self.collection_dir(user_id);
        let poll_interval = self.poll_interval;
        let initial = read_collection(&dir).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(initial.clone());

        tokio::spawn(async move {
            let mut last = initial;
            loop {
                tokio::select! {
                    () = tx.closed() => break,
                    () = tokio::time::sleep(poll_interval) => {}
                }

                match read_collection(&dir).await {
                    Ok(snapshot) if snapshot != last => {
                        if tx.send(snapshot.clone()).is_err() {
                            break;
                        }
                        last = snapshot;
                    }
                    Ok(_) => {}
                    Err(error) => {
                        tracing::warn!("Failed to scan {}: {}", dir.display(), error);
                    }
                }
            }
            tracing::debug!("Stopped polling {}", dir.display());
        });

        Ok(rx)
    }

    async fn write(&self, user_id: &UserId, note: &Note) -> Result<()> {
        let dir = self.collection_dir(user_id);
        tokio::fs::create_dir_all(&dir).await?;

        let path = self.document_path(user_id, &note.id);
        let temp_path = dir.join(format!(".{}.{DOCUMENT_EXTENSION}.tmp", note.id));
        let body = serde_json::to_vec_pretty(note)?;

        tokio::fs::write(&temp_path, body).await?;
        tokio::fs::rename(&temp_path, &path).await?;
        Ok(())
    }

    async fn delete(&self, user_id: &UserId, note_id: &NoteId) -> Result<()> {
        match tokio::fs::remove_file(self.document_path(user_id, note_id)).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}
