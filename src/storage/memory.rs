//! In-memory history store.
//!
//! Backs the one-shot CLI flow and tests, where no database is available.
//! Shares the exact ordering and clearing semantics of the Postgres store.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{DatabaseError, HistoryStore, RunRecord};

/// History store holding records in process memory.
#[derive(Default)]
pub struct MemoryHistoryStore {
    records: Mutex<Vec<RunRecord>>,
}

impl MemoryHistoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, record: &RunRecord) -> Result<(), DatabaseError> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<RunRecord>, DatabaseError> {
        let records = self.records.lock().await;
        let mut sorted: Vec<RunRecord> = records.clone();
        sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sorted.truncate(limit.max(0) as usize);
        Ok(sorted)
    }

    async fn clear(&self) -> Result<u64, DatabaseError> {
        let mut records = self.records.lock().await;
        let deleted = records.len() as u64;
        records.clear();
        Ok(deleted)
    }
}
