//! Settings repository implementation

use crate::error::Result;
use crate::models::Settings;
use rusqlite::Connection;

use super::repository::{SnapshotRepository, SqliteSnapshotRepository, SETTINGS_KEY};

/// Trait for settings storage operations
pub trait SettingsRepository {
    /// Load settings, falling back to defaults when nothing is stored
    fn load(&self) -> Result<Settings>;

    /// Save settings
    fn save(&self, settings: &Settings) -> Result<()>;

    /// Restore default settings
    fn reset(&self) -> Result<Settings>;
}

/// `SQLite` implementation of `SettingsRepository`
pub struct SqliteSettingsRepository<'a> {
    snapshots: SqliteSnapshotRepository<'a>,
}

impl<'a> SqliteSettingsRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self {
            snapshots: SqliteSnapshotRepository::new(conn),
        }
    }
}

impl SettingsRepository for SqliteSettingsRepository<'_> {
    fn load(&self) -> Result<Settings> {
        match self.snapshots.load_json::<Settings>(SETTINGS_KEY) {
            Ok(settings) => Ok(settings.unwrap_or_default()),
            Err(crate::Error::Serialization(error)) => {
                tracing::warn!("Stored settings are unreadable, using defaults: {}", error);
                Ok(Settings::default())
            }
            Err(error) => Err(error),
        }
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        self.snapshots.save_json(SETTINGS_KEY, settings)
    }

    fn reset(&self) -> Result<Settings> {
        self.snapshots.remove(SETTINGS_KEY)?;
        Ok(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::AiProvider;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_load_default_settings() {
        let db = setup();
        let repo = SqliteSettingsRepository::new(db.connection());

        let settings = repo.load().unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_and_load_settings() {
        let db = setup();
        let repo = SqliteSettingsRepository::new(db.connection());

        let settings = Settings {
            provider: AiProvider::Ollama,
            model: "mistral".to_string(),
            ollama_url: "http://10.0.0.2:11434".to_string(),
            ..Settings::default()
        };

        repo.save(&settings).unwrap();

        let loaded = repo.load().unwrap();
        assert_eq!(loaded.provider, AiProvider::Ollama);
        assert_eq!(loaded.model, "mistral");
        assert_eq!(loaded.ollama_url, "http://10.0.0.2:11434");
    }

    #[test]
    fn test_reset_restores_defaults() {
        let db = setup();
        let repo = SqliteSettingsRepository::new(db.connection());

        repo.save(&Settings {
            api_key: "key".to_string(),
            ..Settings::default()
        })
        .unwrap();
        let reset = repo.reset().unwrap();

        assert_eq!(reset, Settings::default());
        assert_eq!(repo.load().unwrap(), Settings::default());
    }

    #[test]
    fn test_corrupt_settings_fall_back_to_defaults() {
        let db = setup();
        SqliteSnapshotRepository::new(db.connection())
            .save(SETTINGS_KEY, "{not json")
            .unwrap();

        let repo = SqliteSettingsRepository::new(db.connection());
        assert_eq!(repo.load().unwrap(), Settings::default());
    }
}
