//! Dedup sink backed by DuckDB
//!
//! Stores observation rows keyed by the remote primary key. `INSERT OR
//! IGNORE` makes re-submission of an already stored record a no-op, which
//! is what lets the controller safely reprocess a page after a crash.

use crate::error::{Error, Result};
use crate::types::Observation;
use duckdb::{params, Connection};
use std::path::Path;
use tracing::{debug, info};

/// Batch insertion with primary-key deduplication.
///
/// The controller writes its checkpoint only after `upsert_batch` returns,
/// so implementations must not report success for a partially stored batch.
pub trait RecordSink: Send {
    /// Store a batch of records, silently dropping duplicates.
    /// Returns the number of rows actually inserted.
    fn upsert_batch(&mut self, records: &[Observation]) -> Result<usize>;
}

/// DuckDB-backed observation store
pub struct ObservationStore {
    conn: Connection,
    table: String,
}

impl ObservationStore {
    /// Open (or create) the database file and ensure the table exists.
    ///
    /// Missing parent directories are created. The table name must already
    /// have been validated as a plain identifier.
    pub fn open(path: impl AsRef<Path>, table: &str) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::sink(format!(
                        "failed to create database directory '{}': {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::sink(format!("failed to open database: {e}")))?;

        let store = Self {
            conn,
            table: table.to_string(),
        };
        store.create_table()?;
        info!(path = %path.display(), table, "observation store ready");
        Ok(store)
    }

    /// Open an in-memory store (used by tests)
    pub fn open_in_memory(table: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::sink(format!("failed to open in-memory database: {e}")))?;
        let store = Self {
            conn,
            table: table.to_string(),
        };
        store.create_table()?;
        Ok(store)
    }

    fn create_table(&self) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id BIGINT PRIMARY KEY,
                observed_on TEXT,
                genus TEXT,
                species TEXT,
                subspecies TEXT,
                coords TEXT,
                latitude DOUBLE,
                longitude DOUBLE,
                locality TEXT,
                introduced BOOLEAN,
                quality_grade TEXT
            )",
            self.table
        );
        self.conn
            .execute_batch(&sql)
            .map_err(|e| Error::sink(format!("failed to create table '{}': {e}", self.table)))
    }

    /// Number of rows currently stored
    pub fn count(&self) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.table);
        self.conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|e| Error::sink(format!("failed to count rows: {e}")))
    }
}

impl RecordSink for ObservationStore {
    fn upsert_batch(&mut self, records: &[Observation]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let tx = self
            .conn
            .transaction()
            .map_err(|e| Error::sink(format!("failed to begin transaction: {e}")))?;

        let mut inserted = 0usize;
        {
            let sql = format!(
                "INSERT OR IGNORE INTO {} VALUES (?,?,?,?,?,?,?,?,?,?,?)",
                self.table
            );
            let mut stmt = tx
                .prepare(&sql)
                .map_err(|e| Error::sink(format!("failed to prepare insert: {e}")))?;

            for obs in records {
                let changed = stmt
                    .execute(params![
                        obs.id,
                        obs.observed_on.map(|d| d.format("%Y-%m-%d").to_string()),
                        obs.genus,
                        obs.species,
                        obs.subspecies,
                        obs.coords,
                        obs.latitude,
                        obs.longitude,
                        obs.place_guess,
                        obs.introduced,
                        obs.quality_grade.map(|g| g.as_str()),
                    ])
                    .map_err(|e| Error::sink(format!("failed to insert row {}: {e}", obs.id)))?;
                inserted += changed;
            }
        }

        tx.commit()
            .map_err(|e| Error::sink(format!("failed to commit batch: {e}")))?;

        debug!(
            batch = records.len(),
            inserted, "observation batch persisted"
        );
        Ok(inserted)
    }
}

impl std::fmt::Debug for ObservationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservationStore")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}
