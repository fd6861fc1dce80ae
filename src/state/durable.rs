//! Durable key-value storage for per-surface state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::persistence::StateKey;
use crate::error::BrowserError;

/// Backing store for values that must outlive a surface instance
pub trait DurableStore: Send + Sync {
    fn read(&self, key: &StateKey) -> Result<Option<String>, BrowserError>;

    fn write(&self, key: &StateKey, value: &str) -> Result<(), BrowserError>;
}

/// SQLite store with one row per `(namespace, instance, key)`
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open the store in the user's data directory.
    ///
    /// - Linux: ~/.local/share/discovery-browser/surface_state.db
    /// - macOS: ~/Library/Application Support/discovery-browser/surface_state.db
    /// - Windows: %APPDATA%\discovery-browser\surface_state.db
    pub fn open_default() -> Result<Self, BrowserError> {
        let path = Self::default_path()?;
        Self::open(path)
    }

    /// Open or create the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BrowserError> {
        let db_path = path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&db_path)?;
        debug!(path = %db_path.display(), "opened surface state database");

        let store = Self { conn: Mutex::new(conn), db_path };
        store.init_schema()?;
        Ok(store)
    }

    /// Private database, used by tests and throwaway sessions
    pub fn in_memory() -> Result<Self, BrowserError> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            db_path: PathBuf::from(":memory:"),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn default_path() -> Result<PathBuf, BrowserError> {
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or(BrowserError::NoDataDirectory)?;

        path.push("discovery-browser");
        path.push("surface_state.db");
        Ok(path)
    }

    fn init_schema(&self) -> Result<(), BrowserError> {
        self.conn.lock().execute(
            "CREATE TABLE IF NOT EXISTS surface_state (
                namespace       TEXT NOT NULL,
                instance        TEXT NOT NULL,
                key             TEXT NOT NULL,
                value           TEXT NOT NULL,
                updated_at      INTEGER NOT NULL,
                PRIMARY KEY (namespace, instance, key)
            )",
            [],
        )?;
        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Number of stored values across all surfaces
    pub fn entry_count(&self) -> Result<i64, BrowserError> {
        let count = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM surface_state", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl DurableStore for SqliteStore {
    fn read(&self, key: &StateKey) -> Result<Option<String>, BrowserError> {
        let value = self
            .conn
            .lock()
            .query_row(
                "SELECT value FROM surface_state WHERE namespace = ?1 AND instance = ?2 AND key = ?3",
                params![key.namespace, key.instance, key.logical.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write(&self, key: &StateKey, value: &str) -> Result<(), BrowserError> {
        self.conn.lock().execute(
            "INSERT INTO surface_state (namespace, instance, key, value, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (namespace, instance, key)
             DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![
                key.namespace,
                key.instance,
                key.logical.as_str(),
                value,
                chrono::Utc::now().timestamp()
            ],
        )?;
        Ok(())
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<StateKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStore for MemoryStore {
    fn read(&self, key: &StateKey) -> Result<Option<String>, BrowserError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn write(&self, key: &StateKey, value: &str) -> Result<(), BrowserError> {
        self.values.lock().insert(key.clone(), value.to_string());
        Ok(())
    }
}
