pub mod models;
pub mod queries;

use crate::fingerprint::StrategyId;
use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

pub struct Database {
    pub conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        // WAL mode for better concurrent read performance
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        self.migrate()?;
        Ok(())
    }

    fn migrate(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        if version < 1 {
            self.migrate_v1()?;
        }

        self.conn.pragma_update(None, "user_version", 1)?;
        Ok(())
    }

    /// V1: recordings registry plus one fingerprint table per strategy.
    /// Lookups are always by hash, never by time or audio_id alone, so
    /// the hash index is the only one the access pattern needs.
    fn migrate_v1(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS recordings (
                audio_id        INTEGER PRIMARY KEY AUTOINCREMENT,
                file_path       TEXT NOT NULL UNIQUE,
                display_name    TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );
            ",
        )?;

        for strategy in StrategyId::ALL {
            let table = strategy.table();
            self.conn.execute_batch(&format!(
                "
                CREATE TABLE IF NOT EXISTS {table} (
                    hash_hex    TEXT NOT NULL,
                    time_index  INTEGER NOT NULL,
                    audio_id    INTEGER NOT NULL REFERENCES recordings(audio_id) ON DELETE CASCADE
                );
                CREATE INDEX IF NOT EXISTS idx_{table}_hash ON {table} (hash_hex);
                ",
            ))?;
        }

        Ok(())
    }
}
