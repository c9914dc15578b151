//! Error types for notelm-core

use thiserror::Error;

/// Result type alias using notelm-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in notelm-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Note not found
    #[error("Note not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote channel failure (network, permission, unavailable backend)
    #[error("Remote error: {0}")]
    Remote(String),

    /// The sync engine task is no longer running
    #[error("Sync engine stopped")]
    EngineStopped,
}

impl Error {
    /// Whether the error came from the remote side and may succeed on retry.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Remote(_) | Self::Io(_))
    }
}
