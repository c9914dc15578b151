//! Data models for NoteLM

mod attachment;
mod note;
mod settings;
mod sync_conflict;

pub use attachment::{Attachment, AttachmentKind};
pub use note::{Note, NoteId, NotePatch, DEFAULT_NOTE_TITLE};
pub use settings::{AiProvider, Settings, DEFAULT_MODEL, DEFAULT_OLLAMA_URL};
pub use sync_conflict::{ConflictOutcome, SyncConflict};
