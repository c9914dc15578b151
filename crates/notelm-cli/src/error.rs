use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] notelm_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No note content provided")]
    EmptyContent,
    #[error("Edited note content cannot be empty")]
    EmptyEditedContent,
    #[error("Note ID cannot be empty")]
    EmptyNoteId,
    #[error("Search query cannot be empty")]
    EmptySearchQuery,
    #[error("Note not found for id/prefix: {0}")]
    NoteNotFound(String),
    #[error("{0}")]
    AmbiguousNoteId(String),
    #[error("No note is currently selected")]
    NoSelection,
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Nothing to update; pass at least one setting")]
    NothingToUpdate,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Sync is not configured. Run `notelm config init --remote-dir <path> --user-id <id>`, or set NOTELM_REMOTE_DIR and NOTELM_USER_ID."
    )]
    SyncNotConfigured,
}
