use std::path::Path;

use rusqlite::{Connection, OptionalExtension};

use crate::error::{BoardError, Result};

const LOCAL_DB: &str = "local.db";

/// Durable key-value storage scoped to one device. Nothing here is shared
/// with other clients.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// SQLite-backed [`KeyValueStore`]
pub struct LocalStore {
    conn: Connection,
}

impl LocalStore {
    /// Open or create the local database inside `board_dir`
    pub fn open(board_dir: &Path) -> Result<Self> {
        let conn = Connection::open(board_dir.join(LOCAL_DB))?;

        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// A database that disappears with this value.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }
}

impl KeyValueStore for LocalStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let result: Option<String> = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(result)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            [key, value],
        )?;
        Ok(())
    }
}

impl From<rusqlite::Error> for BoardError {
    fn from(e: rusqlite::Error) -> Self {
        BoardError::Storage(format!("SQLite error: {}", e))
    }
}
