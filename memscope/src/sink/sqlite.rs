//! Content-addressed SQLite sink.
//!
//! Logs are stored once per distinct text, keyed by their SHA-256; entries
//! reference them by hash. Each entry lands in its own transaction, so a
//! crash never leaves an entry without its log.

use crate::domain::{ProfileEntry, SinkError};
use crate::sink::ProfileSink;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS logs (
    hash TEXT PRIMARY KEY,
    log_text TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    func TEXT NOT NULL,
    mem_before REAL NOT NULL,
    mem_after REAL NOT NULL,
    mem_diff REAL NOT NULL,
    timestamp REAL NOT NULL,
    log_hash TEXT NOT NULL REFERENCES logs(hash)
);
";

pub struct SqliteSink {
    /// `None` once closed.
    conn: Mutex<Option<Connection>>,
}

impl SqliteSink {
    /// Open (or create) the database and ensure the schema exists.
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(Some(conn)) })
    }
}

impl ProfileSink for SqliteSink {
    fn handle(&self, entry: &ProfileEntry) -> Result<(), SinkError> {
        let mut guard = self.conn.lock().map_err(|_| SinkError::Poisoned)?;
        let conn = guard.as_mut().ok_or(SinkError::Closed)?;
        let hash = entry.log_hash();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO logs (hash, log_text) VALUES (?1, ?2)",
            (&hash, &entry.log),
        )?;
        tx.execute(
            "INSERT INTO entries (func, mem_before, mem_after, mem_diff, timestamp, log_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            (
                &entry.func,
                entry.mem_before,
                entry.mem_after,
                entry.mem_diff,
                entry.timestamp,
                &hash,
            ),
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Hand the connection back to SQLite. Idempotent.
    fn close(&self) -> Result<(), SinkError> {
        let mut guard = self.conn.lock().map_err(|_| SinkError::Poisoned)?;
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, err)| SinkError::Sqlite(err))?;
        }
        Ok(())
    }
}
