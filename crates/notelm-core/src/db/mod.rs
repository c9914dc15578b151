//! Database layer for NoteLM

mod connection;
mod migrations;
mod repository;
mod settings_repository;

pub use connection::Database;
pub use repository::{SnapshotRepository, SqliteSnapshotRepository, NOTE_STORE_KEY, SETTINGS_KEY};
pub use settings_repository::{SettingsRepository, SqliteSettingsRepository};
