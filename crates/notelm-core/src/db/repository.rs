//! Snapshot repository implementation
//!
//! Each persisted store is written as one JSON document under a namespaced
//! key, replacing the previous snapshot in a single statement.

use crate::error::Result;
use crate::util::unix_millis_now;
use rusqlite::{params, Connection, OptionalExtension};

/// Key under which the note store snapshot is persisted
pub const NOTE_STORE_KEY: &str = "notelm-storage";
/// Key under which the settings snapshot is persisted
pub const SETTINGS_KEY: &str = "notelm-settings";

/// Trait for namespaced snapshot storage
pub trait SnapshotRepository {
    /// Load the raw snapshot stored under `key`
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Replace the snapshot stored under `key`
    fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the snapshot stored under `key`
    fn remove(&self, key: &str) -> Result<()>;
}

/// `SQLite` implementation of `SnapshotRepository`
pub struct SqliteSnapshotRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSnapshotRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Load and decode a JSON snapshot
    pub fn load_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.load(key)?
            .map(|raw| serde_json::from_str(&raw).map_err(Into::into))
            .transpose()
    }

    /// Encode and store a JSON snapshot
    pub fn save_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.save(key, &raw)
    }
}

impl SnapshotRepository for SqliteSnapshotRepository<'_> {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv_store (key, value, saved_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, saved_at = excluded.saved_at",
            params![key, value, unix_millis_now()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv_store WHERE key = ?", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_load_missing_key() {
        let db = setup();
        let repo = SqliteSnapshotRepository::new(db.connection());
        assert!(repo.load(NOTE_STORE_KEY).unwrap().is_none());
    }

    #[test]
    fn test_save_replaces_previous_value() {
        let db = setup();
        let repo = SqliteSnapshotRepository::new(db.connection());

        repo.save(NOTE_STORE_KEY, "first").unwrap();
        repo.save(NOTE_STORE_KEY, "second").unwrap();

        assert_eq!(repo.load(NOTE_STORE_KEY).unwrap().as_deref(), Some("second"));
        let rows: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM kv_store", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_keys_are_namespaced() {
        let db = setup();
        let repo = SqliteSnapshotRepository::new(db.connection());

        repo.save(NOTE_STORE_KEY, "notes").unwrap();
        repo.save(SETTINGS_KEY, "settings").unwrap();
        repo.remove(NOTE_STORE_KEY).unwrap();

        assert!(repo.load(NOTE_STORE_KEY).unwrap().is_none());
        assert_eq!(repo.load(SETTINGS_KEY).unwrap().as_deref(), Some("settings"));
    }

    #[test]
    fn test_json_helpers() {
        let db = setup();
        let repo = SqliteSnapshotRepository::new(db.connection());

        repo.save_json("numbers", &vec![1, 2, 3]).unwrap();
        let loaded: Option<Vec<i32>> = repo.load_json("numbers").unwrap();
        assert_eq!(loaded, Some(vec![1, 2, 3]));
    }
}
