//! Shared note service handle used across clients and the sync engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, MutexGuard};

use crate::clock::{Clock, SystemClock};
use crate::db::Database;
use crate::models::{AttachmentKind, Note, NoteId, NotePatch, Settings};
use crate::store::{DocumentStore, RemoteApply, StoreEvent};
use crate::Result;

/// Thread-safe handle over the document store.
///
/// Every call takes the store lock for its duration, so the editing path and
/// the sync engine never mutate the note set concurrently.
#[derive(Clone)]
pub struct NoteService {
    store: Arc<Mutex<DocumentStore>>,
    db_path: Option<PathBuf>,
}

impl NoteService {
    /// Open a note service backed by the database at `db_path`.
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_path_with_clock(db_path, Arc::new(SystemClock))
    }

    /// Open a note service at `db_path` stamping notes with `clock`.
    pub fn open_path_with_clock(db_path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self> {
        let db_path = db_path.into();
        let store = DocumentStore::open(Database::open(&db_path)?, clock)?;
        tracing::debug!("Opened note store at {}", db_path.display());
        Ok(Self {
            store: Arc::new(Mutex::new(store)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory note service (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        Self::in_memory_with_clock(Arc::new(SystemClock))
    }

    /// Open an in-memory note service stamping notes with `clock`.
    pub fn in_memory_with_clock(clock: Arc<dyn Clock>) -> Result<Self> {
        let store = DocumentStore::open(Database::open_in_memory()?, clock)?;
        Ok(Self {
            store: Arc::new(Mutex::new(store)),
            db_path: None,
        })
    }

    /// Path of the backing database, if file-backed.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Lock the underlying store for a multi-step operation.
    pub async fn lock(&self) -> MutexGuard<'_, DocumentStore> {
        self.store.lock().await
    }

    /// Subscribe to local mutation events.
    pub async fn subscribe(&self) -> mpsc::UnboundedReceiver<StoreEvent> {
        self.store.lock().await.subscribe()
    }

    /// Create a note and return it.
    pub async fn create_note(&self) -> Result<Note> {
        let mut store = self.store.lock().await;
        let id = store.create()?;
        cloned_note(&store, &id)
    }

    /// Create a note with the given content.
    pub async fn create_note_with(&self, patch: NotePatch) -> Result<Note> {
        let mut store = self.store.lock().await;
        let id = store.create()?;
        if patch.is_empty() {
            return cloned_note(&store, &id);
        }
        store.update(&id, patch)
    }

    /// Apply a partial update to a note.
    pub async fn update_note(&self, id: &NoteId, patch: NotePatch) -> Result<Note> {
        self.store.lock().await.update(id, patch)
    }

    /// Delete a note.
    pub async fn delete_note(&self, id: &NoteId) -> Result<()> {
        self.store.lock().await.delete(id)
    }

    /// Select the active note.
    pub async fn select_note(&self, id: &NoteId) -> Result<()> {
        self.store.lock().await.select(id)
    }

    /// Clear the active note.
    pub async fn clear_selection(&self) -> Result<()> {
        self.store.lock().await.clear_selection()
    }

    /// Fetch a note by id.
    pub async fn get_note(&self, id: &NoteId) -> Option<Note> {
        self.store.lock().await.get(id).cloned()
    }

    /// All notes in display order.
    pub async fn list_notes(&self) -> Vec<Note> {
        self.store.lock().await.notes().to_vec()
    }

    /// The active note.
    pub async fn current_note(&self) -> Option<Note> {
        self.store.lock().await.current_note().cloned()
    }

    /// Search notes by query.
    pub async fn search_notes(&self, query: &str) -> Vec<Note> {
        self.store.lock().await.search(query)
    }

    /// List notes by tag.
    pub async fn list_notes_by_tag(&self, tag: &str) -> Vec<Note> {
        self.store.lock().await.notes_with_tag(tag)
    }

    /// List unique tags.
    pub async fn list_tags(&self) -> Vec<String> {
        self.store.lock().await.all_tags()
    }

    /// Add a tag to a note.
    pub async fn add_tag(&self, id: &NoteId, tag: &str) -> Result<Note> {
        self.store.lock().await.add_tag(id, tag)
    }

    /// Remove a tag from a note.
    pub async fn remove_tag(&self, id: &NoteId, tag: &str) -> Result<Note> {
        self.store.lock().await.remove_tag(id, tag)
    }

    /// Link a source URL.
    pub async fn add_source(&self, id: &NoteId, source: &str) -> Result<Note> {
        self.store.lock().await.add_source(id, source)
    }

    /// Unlink a source URL.
    pub async fn remove_source(&self, id: &NoteId, source: &str) -> Result<Note> {
        self.store.lock().await.remove_source(id, source)
    }

    /// Attach a document with its extracted text.
    pub async fn attach(
        &self,
        id: &NoteId,
        name: &str,
        kind: AttachmentKind,
        extracted_text: &str,
    ) -> Result<Note> {
        self.store.lock().await.attach(id, name, kind, extracted_text)
    }

    /// Apply remote changes without emitting local events.
    pub async fn apply_remote(&self, changes: RemoteApply) -> Result<()> {
        self.store.lock().await.apply_remote(changes)
    }

    /// Replace the whole collection without emitting local events.
    pub async fn replace_all(&self, notes: Vec<Note>) -> Result<()> {
        self.store.lock().await.replace_all(notes)
    }

    /// Load settings.
    pub async fn load_settings(&self) -> Result<Settings> {
        self.store.lock().await.load_settings()
    }

    /// Save settings.
    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.store.lock().await.save_settings(settings)
    }

    /// Reset settings to defaults.
    pub async fn reset_settings(&self) -> Result<Settings> {
        self.store.lock().await.reset_settings()
    }
}

fn cloned_note(store: &DocumentStore, id: &NoteId) -> Result<Note> {
    store
        .get(id)
        .cloned()
        .ok_or_else(|| crate::Error::NotFound(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn in_memory_create_and_list_roundtrip() {
        let service = NoteService::open_in_memory().unwrap();

        service
            .create_note_with(NotePatch::default().content("hello core"))
            .await
            .unwrap();
        let notes = service.list_notes().await;
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].content, "hello core");
        assert_eq!(service.current_note().await.unwrap().id, notes[0].id);
    }

    #[tokio::test]
    async fn clones_share_the_same_store() {
        let service = NoteService::open_in_memory().unwrap();
        let other = service.clone();

        let note = service.create_note().await.unwrap();
        other.add_tag(&note.id, "shared").await.unwrap();

        assert_eq!(service.list_tags().await, vec!["shared"]);
        assert_eq!(service.list_notes_by_tag("shared").await.len(), 1);
    }

    #[tokio::test]
    async fn subscribers_see_service_mutations() {
        let service = NoteService::open_in_memory().unwrap();
        let mut events = service.subscribe().await;

        let note = service.create_note().await.unwrap();
        service.delete_note(&note.id).await.unwrap();

        assert_eq!(events.recv().await.unwrap().note_id(), note.id);
        assert_eq!(
            events.recv().await.unwrap(),
            StoreEvent::Deleted { id: note.id }
        );
    }

    #[tokio::test]
    async fn file_backed_service_reopens() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("notelm.db");

        let id = {
            let service = NoteService::open_path(&path).unwrap();
            assert_eq!(service.db_path(), Some(path.as_path()));
            service.create_note().await.unwrap().id
        };

        let service = NoteService::open_path(&path).unwrap();
        assert!(service.get_note(&id).await.is_some());
    }
}
