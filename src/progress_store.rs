// Copyright (c) MegaYours, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Durable watermark store.
//!
//! A single append-only table of processed source row identifiers. The
//! watermark is the highest recorded id; it is read at the start of each
//! poll cycle and written only after an event's processing (transfer or
//! deliberate skip) has fully completed. There is no delete or rollback
//! operation, history is append-only.

use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{RelayError, RelayResult};

pub struct ProgressStore {
    // Single writer; the mutex serializes access to the connection.
    conn: Mutex<Connection>,
}

impl ProgressStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: &Path) -> RelayResult<Self> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> RelayResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Idempotently ensure the cursor table exists. Safe to call on
    /// every startup.
    pub async fn initialize(&self) -> RelayResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS processed_rows (rowid INTEGER PRIMARY KEY)",
            [],
        )?;
        Ok(())
    }

    /// Durably mark a row identifier as processed. Recording the same id
    /// twice is a no-op, not an error, so retried cycles stay safe.
    pub async fn record_processed(&self, rowid: u64) -> RelayResult<()> {
        let id = i64::try_from(rowid).map_err(|_| {
            RelayError::Storage(format!("row id {rowid} exceeds the storage range"))
        })?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR IGNORE INTO processed_rows (rowid) VALUES (?1)",
            [id],
        )?;
        debug!(rowid, "recorded processed row");
        Ok(())
    }

    /// Highest recorded row identifier, or `None` if nothing has been
    /// processed yet. Used as the exclusive lower bound of the next fetch.
    pub async fn last_processed(&self) -> RelayResult<Option<u64>> {
        let conn = self.conn.lock().await;
        let max: Option<i64> = conn
            .query_row("SELECT MAX(rowid) FROM processed_rows", [], |row| {
                row.get(0)
            })
            .optional()?
            .flatten();
        Ok(max.map(|v| v as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn new_store() -> ProgressStore {
        let store = ProgressStore::open_in_memory().unwrap();
        store.initialize().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let store = new_store().await;
        // A second initialize on the same connection must not fail.
        store.initialize().await.unwrap();
        assert_eq!(store.last_processed().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_store_has_no_watermark() {
        let store = new_store().await;
        assert_eq!(store.last_processed().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_record_processed_is_idempotent() {
        let store = new_store().await;
        store.record_processed(42).await.unwrap();
        store.record_processed(42).await.unwrap();
        assert_eq!(store.last_processed().await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn test_watermark_is_monotonic() {
        let store = new_store().await;
        let mut previous = 0u64;
        for id in [1u64, 3, 2, 7, 7, 5] {
            store.record_processed(id).await.unwrap();
            let current = store.last_processed().await.unwrap().unwrap();
            assert!(current >= previous, "watermark went backwards");
            previous = current;
        }
        assert_eq!(previous, 7);
    }

    #[tokio::test]
    async fn test_record_rejects_out_of_range_id() {
        let store = new_store().await;
        let err = store.record_processed(u64::MAX).await.unwrap_err();
        assert_eq!(err.error_type(), "storage");
        assert_eq!(store.last_processed().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.sqlite");
        {
            let store = ProgressStore::open(&path).unwrap();
            store.initialize().await.unwrap();
            store.record_processed(9).await.unwrap();
        }
        let store = ProgressStore::open(&path).unwrap();
        store.initialize().await.unwrap();
        assert_eq!(store.last_processed().await.unwrap(), Some(9));
    }
}
