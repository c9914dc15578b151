//! Document store: the authoritative local note set.
//!
//! Every mutation is persisted as a full snapshot before the call returns
//! and before observers are notified. A failed write rolls the in-memory
//! state back, so memory never runs ahead of disk.

mod events;

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::clock::{Clock, SystemClock};
use crate::db::{
    Database, SettingsRepository, SqliteSettingsRepository, SqliteSnapshotRepository,
    NOTE_STORE_KEY,
};
use crate::error::{Error, Result};
use crate::models::{Attachment, AttachmentKind, Note, NoteId, NotePatch, Settings};
use crate::util::{compact_text, is_http_url};

pub use events::{RemoteApply, StoreEvent};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    #[serde(default)]
    notes: Vec<Note>,
    #[serde(default)]
    current_note_id: Option<NoteId>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersistedStateRef<'a> {
    notes: &'a [Note],
    current_note_id: Option<NoteId>,
}

/// In-memory note table persisted to the local database.
pub struct DocumentStore {
    db: Database,
    clock: Arc<dyn Clock>,
    notes: Vec<Note>,
    current_note_id: Option<NoteId>,
    subscribers: Vec<mpsc::UnboundedSender<StoreEvent>>,
}

impl DocumentStore {
    /// Open the store on `db`, restoring the persisted snapshot if any
    pub fn open(db: Database, clock: Arc<dyn Clock>) -> Result<Self> {
        let state = SqliteSnapshotRepository::new(db.connection())
            .load_json::<PersistedState>(NOTE_STORE_KEY)?
            .unwrap_or_default();

        let current_note_id = state
            .current_note_id
            .filter(|id| state.notes.iter().any(|note| note.id == *id));

        tracing::debug!("Restored {} notes from local storage", state.notes.len());

        Ok(Self {
            db,
            clock,
            notes: state.notes,
            current_note_id,
            subscribers: Vec::new(),
        })
    }

    /// Open an in-memory store on the system clock (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::open(Database::open_in_memory()?, Arc::new(SystemClock))
    }

    /// Register an observer for local mutations
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<StoreEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Create a new empty note, select it, and return its id
    pub fn create(&mut self) -> Result<NoteId> {
        let note = Note::new(self.clock.now_millis());
        let id = note.id;
        let updated_at = note.updated_at;

        self.commit(|store| {
            store.notes.insert(0, note);
            store.current_note_id = Some(id);
            Ok(())
        })?;

        tracing::debug!("Created note {}", id);
        self.emit(StoreEvent::Created { id, updated_at });
        Ok(id)
    }

    /// Merge `patch` into the note and advance its `updated_at`.
    ///
    /// An empty patch still advances the timestamp.
    pub fn update(&mut self, id: &NoteId, patch: NotePatch) -> Result<Note> {
        let now = self.clock.now_millis();
        let updated = self.commit(|store| {
            let note = store
                .notes
                .iter_mut()
                .find(|note| note.id == *id)
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            note.merge(patch);
            note.updated_at = now.max(note.updated_at.saturating_add(1));
            Ok(note.clone())
        })?;

        self.emit(StoreEvent::Updated {
            id: *id,
            updated_at: updated.updated_at,
        });
        Ok(updated)
    }

    /// Mark a note as the active one
    pub fn select(&mut self, id: &NoteId) -> Result<()> {
        if self.get(id).is_none() {
            return Err(Error::NotFound(id.to_string()));
        }
        self.commit(|store| {
            store.current_note_id = Some(*id);
            Ok(())
        })
    }

    /// Clear the active note
    pub fn clear_selection(&mut self) -> Result<()> {
        self.commit(|store| {
            store.current_note_id = None;
            Ok(())
        })
    }

    /// Remove a note from the local set
    pub fn delete(&mut self, id: &NoteId) -> Result<()> {
        self.commit(|store| {
            let index = store
                .notes
                .iter()
                .position(|note| note.id == *id)
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            store.notes.remove(index);
            if store.current_note_id == Some(*id) {
                store.current_note_id = None;
            }
            Ok(())
        })?;

        tracing::debug!("Deleted note {}", id);
        self.emit(StoreEvent::Deleted { id: *id });
        Ok(())
    }

    /// Replace the whole collection without notifying observers.
    ///
    /// Reserved for applying remote state.
    pub fn replace_all(&mut self, notes: Vec<Note>) -> Result<()> {
        self.commit(|store| {
            store.notes = notes;
            store.retain_valid_selection();
            Ok(())
        })
    }

    /// Apply per-note remote changes without notifying observers
    pub fn apply_remote(&mut self, changes: RemoteApply) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        self.commit(|store| {
            let mut inserted = Vec::new();
            for remote in changes.upserts {
                if let Some(local) = store.notes.iter_mut().find(|note| note.id == remote.id) {
                    *local = remote;
                } else {
                    inserted.push(remote);
                }
            }
            inserted.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            store.notes.splice(0..0, inserted);

            store
                .notes
                .retain(|note| !changes.removals.contains(&note.id));
            store.retain_valid_selection();
            Ok(())
        })
    }

    /// Fetch a note by id
    pub fn get(&self, id: &NoteId) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == *id)
    }

    /// All notes in display order (newest created first)
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Active note id
    pub const fn current_note_id(&self) -> Option<NoteId> {
        self.current_note_id
    }

    /// Active note
    pub fn current_note(&self) -> Option<&Note> {
        self.current_note_id.and_then(|id| self.get(&id))
    }

    /// Unique tags across all notes, sorted
    pub fn all_tags(&self) -> Vec<String> {
        self.notes
            .iter()
            .flat_map(|note| note.tags.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Notes carrying `tag`
    pub fn notes_with_tag(&self, tag: &str) -> Vec<Note> {
        let tag = tag.trim();
        self.notes
            .iter()
            .filter(|note| note.tags.contains(tag))
            .cloned()
            .collect()
    }

    /// Case-insensitive search across titles and content
    pub fn search(&self, query: &str) -> Vec<Note> {
        self.notes
            .iter()
            .filter(|note| note.matches_query(query))
            .cloned()
            .collect()
    }

    /// Add a tag to a note
    pub fn add_tag(&mut self, id: &NoteId, tag: &str) -> Result<Note> {
        let mut tags = self.require(id)?.tags.clone();
        tags.insert(tag.to_string());
        self.update(id, NotePatch::default().tags(tags))
    }

    /// Remove a tag from a note
    pub fn remove_tag(&mut self, id: &NoteId, tag: &str) -> Result<Note> {
        let mut tags = self.require(id)?.tags.clone();
        tags.remove(tag.trim());
        self.update(id, NotePatch::default().tags(tags))
    }

    /// Link an `http(s)` source URL to a note
    pub fn add_source(&mut self, id: &NoteId, source: &str) -> Result<Note> {
        let source = source.trim();
        if !is_http_url(source) {
            return Err(Error::InvalidInput(format!(
                "Source must be an http(s) URL: {}",
                compact_text(source)
            )));
        }
        let mut sources = self.require(id)?.sources.clone();
        sources.insert(source.to_string());
        self.update(id, NotePatch::default().sources(sources))
    }

    /// Unlink a source URL from a note
    pub fn remove_source(&mut self, id: &NoteId, source: &str) -> Result<Note> {
        let mut sources = self.require(id)?.sources.clone();
        sources.remove(source.trim());
        self.update(id, NotePatch::default().sources(sources))
    }

    /// Attach a document whose text was already extracted.
    ///
    /// The extracted text replaces the note content, the attachment is
    /// appended, and an untitled note takes the file name as its title.
    pub fn attach(
        &mut self,
        id: &NoteId,
        name: &str,
        kind: AttachmentKind,
        extracted_text: &str,
    ) -> Result<Note> {
        let note = self.require(id)?;
        let attachment = Attachment::new(name, kind, self.clock.now_millis())?;

        let mut patch = NotePatch::default().content(extracted_text);
        if note.is_untitled() {
            patch = patch.title(attachment.stem());
        }
        let mut attachments = note.attachments.clone();
        attachments.push(attachment);

        self.update(id, patch.attachments(attachments))
    }

    /// Load AI provider settings
    pub fn load_settings(&self) -> Result<Settings> {
        SqliteSettingsRepository::new(self.db.connection()).load()
    }

    /// Persist AI provider settings
    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        SqliteSettingsRepository::new(self.db.connection()).save(settings)
    }

    /// Restore default AI provider settings
    pub fn reset_settings(&self) -> Result<Settings> {
        SqliteSettingsRepository::new(self.db.connection()).reset()
    }

    fn require(&self, id: &NoteId) -> Result<&Note> {
        self.get(id).ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn retain_valid_selection(&mut self) {
        if let Some(id) = self.current_note_id {
            if self.get(&id).is_none() {
                self.current_note_id = None;
            }
        }
    }

    /// Run `mutate`, then persist; restore the previous state on any failure.
    fn commit<T>(&mut self, mutate: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let previous_notes = self.notes.clone();
        let previous_current = self.current_note_id;

        let outcome = mutate(self).and_then(|value| {
            self.persist()?;
            Ok(value)
        });

        if outcome.is_err() {
            self.notes = previous_notes;
            self.current_note_id = previous_current;
        }
        outcome
    }

    fn persist(&self) -> Result<()> {
        let state = PersistedStateRef {
            notes: &self.notes,
            current_note_id: self.current_note_id,
        };
        SqliteSnapshotRepository::new(self.db.connection()).save_json(NOTE_STORE_KEY, &state)
    }

    fn emit(&mut self, event: StoreEvent) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }
}
