//! SQLite-backed ledger store
//!
//! Schema:
//! ```text
//! posts(id TEXT PRIMARY KEY, created_at INTEGER)
//! ```
//!
//! Rows are only ever inserted. The connection is owned by [`Ledger`] and
//! closed when it is dropped.

use super::Fingerprint;
use crate::error::{Error, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS posts (
    id         TEXT PRIMARY KEY,
    created_at INTEGER NOT NULL
)";

/// Append-only set of published fingerprints
pub struct Ledger {
    conn: Connection,
}

impl Ledger {
    /// Open (or create) the ledger file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path).map_err(|e| {
            Error::Storage(format!("Failed to open ledger {}: {}", path.display(), e))
        })?;
        Self::init(conn)
    }

    /// Ledger that lives only as long as the value
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("Failed to open in-memory ledger: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| Error::Storage(format!("Failed to create ledger schema: {}", e)))?;
        Ok(Self { conn })
    }

    /// Returns `true` if the fingerprint was already recorded. Otherwise
    /// records it with the current time and returns `false`.
    ///
    /// Lookup and insert are a single statement, so two callers can never
    /// both observe `false` for the same fingerprint.
    pub fn seen_or_record(&self, fingerprint: &Fingerprint) -> Result<bool> {
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO posts (id, created_at) VALUES (?1, ?2)",
                params![fingerprint.as_str(), chrono::Utc::now().timestamp()],
            )
            .map_err(|e| Error::Storage(format!("Failed to record fingerprint: {}", e)))?;

        let seen = inserted == 0;
        tracing::debug!(fingerprint = %fingerprint, seen, "Ledger check");
        Ok(seen)
    }

    /// Whether the fingerprint is recorded, without recording it
    pub fn contains(&self, fingerprint: &Fingerprint) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT 1 FROM posts WHERE id = ?1",
                params![fingerprint.as_str()],
                |_| Ok(()),
            )
            .optional()
            .map(|row| row.is_some())
            .map_err(|e| Error::Storage(format!("Failed to query ledger: {}", e)))
    }

    /// Number of recorded fingerprints
    pub fn len(&self) -> Result<u64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM posts", [], |row| row.get::<_, i64>(0))
            .map(|n| n as u64)
            .map_err(|e| Error::Storage(format!("Failed to count ledger entries: {}", e)))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) {
        self.conn.execute_batch(sql).unwrap();
    }
}
