//! Change notifications emitted by the document store.

use crate::models::{Note, NoteId};

/// A local mutation observed on the store.
///
/// Only user-path mutations (`create`, `update`, `delete`) are reported.
/// Remote applies never produce events, so the sync engine cannot mistake
/// them for local edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    /// A note was created locally
    Created { id: NoteId, updated_at: i64 },
    /// A note was updated locally
    Updated { id: NoteId, updated_at: i64 },
    /// A note was deleted locally
    Deleted { id: NoteId },
}

impl StoreEvent {
    /// The note the event refers to
    pub const fn note_id(&self) -> NoteId {
        match self {
            Self::Created { id, .. } | Self::Updated { id, .. } | Self::Deleted { id } => *id,
        }
    }
}

/// Per-note changes computed from a remote snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteApply {
    /// Remote versions to insert or overwrite locally
    pub upserts: Vec<Note>,
    /// Notes deleted remotely
    pub removals: Vec<NoteId>,
}

impl RemoteApply {
    /// True when applying would not change the store
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removals.is_empty()
    }
}
