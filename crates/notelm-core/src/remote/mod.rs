//! Remote channel abstraction for multi-device sync.
//!
//! A remote channel is a per-user collection of note documents. Subscribers
//! receive the complete collection on subscribe and again after every
//! change; writes upsert one full document keyed by note id.

mod fs;
mod memory;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::models::{Note, NoteId};

pub use fs::FsRemote;
pub use memory::{MemoryRemote, WriteRecord};

/// Receiver half of a snapshot subscription.
pub type SnapshotReceiver = mpsc::UnboundedReceiver<RemoteSnapshot>;

/// Authenticated user namespace on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Validate and wrap a user id.
    ///
    /// Ids double as directory names for file-backed remotes, so path
    /// separators and dot segments are rejected.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into().trim().to_string();
        if value.is_empty() {
            return Err(Error::InvalidInput("User id cannot be empty".to_string()));
        }
        if value == "." || value == ".." || value.contains(['/', '\\']) {
            return Err(Error::InvalidInput(format!("Invalid user id: {value}")));
        }
        Ok(Self(value))
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Complete state of one user's remote collection at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSnapshot {
    notes: BTreeMap<NoteId, Note>,
}

impl RemoteSnapshot {
    /// Build a snapshot from documents.
    pub fn new(notes: impl IntoIterator<Item = Note>) -> Self {
        Self {
            notes: notes.into_iter().map(|note| (note.id, note)).collect(),
        }
    }

    /// Look up one document.
    pub fn get(&self, id: &NoteId) -> Option<&Note> {
        self.notes.get(id)
    }

    /// Whether the collection holds `id`.
    pub fn contains(&self, id: &NoteId) -> bool {
        self.notes.contains_key(id)
    }

    /// Iterate documents in id order.
    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.values()
    }

    /// Consume into documents.
    pub fn into_notes(self) -> Vec<Note> {
        self.notes.into_values().collect()
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// True when the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// A remote channel handles communication with the shared note collection.
///
/// Implementations must deliver the current state immediately on
/// `subscribe`, and `write` must be idempotent.
pub trait RemoteChannel: Send + Sync + 'static {
    /// Subscribe to full-collection snapshots for `user_id`.
    fn subscribe(&self, user_id: &UserId) -> impl Future<Output = Result<SnapshotReceiver>> + Send;

    /// Upsert the full document for `note`.
    fn write(&self, user_id: &UserId, note: &Note) -> impl Future<Output = Result<()>> + Send;

    /// Remove the document for `note_id`; absent documents are not an error.
    fn delete(&self, user_id: &UserId, note_id: &NoteId)
        -> impl Future<Output = Result<()>> + Send;
}
