// SQLite-backed slot

use crate::slot::Slot;
use crate::task::now_ms;
use eyre::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const DB_FILE: &str = "tasklist.db";

/// Slot storing each key as one row of a SQLite table
pub struct SqliteSlot {
    path: PathBuf,
    db: Connection,
}

impl SqliteSlot {
    /// Open or create the database inside `dir`
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).context("Failed to create store directory")?;

        let path = dir.join(DB_FILE);
        let db = Connection::open(&path).context("Failed to open SQLite database")?;

        let slot = Self { path, db };
        slot.create_schema()?;
        Ok(slot)
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let slot = Self {
            path: PathBuf::from(":memory:"),
            db,
        };
        slot.create_schema()?;
        Ok(slot)
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn create_schema(&self) -> Result<()> {
        debug!(path = ?self.path, "Creating slot schema");

        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS slots (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(())
    }
}

impl Slot for SqliteSlot {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.db
            .query_row("SELECT value FROM slots WHERE key = ?1", [key], |row| row.get(0))
            .optional()
            .context("Failed to read slot")
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.db
            .execute(
                "INSERT OR REPLACE INTO slots (key, value, updated_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![key, value, now_ms()],
            )
            .context("Failed to write slot")?;

        debug!(key, bytes = value.len(), "Wrote slot");
        Ok(())
    }
}
