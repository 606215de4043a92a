//! Persistent storage for completed profiling runs.
//!
//! The history store is the only shared mutable resource across concurrent
//! runs. It supports three operations: append a completed run, list the most
//! recent runs newest-first with a bounded page size, and an atomic bulk
//! clear. Records are insert-only and never mutated.
//!
//! The store handle is constructed explicitly at startup and injected into
//! the orchestrator and server, with no process-global state.

mod database;
mod memory;
mod migrations;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use database::{DatabaseError, PgHistoryStore};
pub use memory::MemoryHistoryStore;
pub use migrations::{MigrationError, MigrationRunner};

/// Number of records returned by a history listing.
pub const HISTORY_PAGE_SIZE: i64 = 20;

/// Durable record of one completed streaming run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Generated unique identifier.
    pub id: Uuid,
    /// Repository reference that was profiled.
    pub repo_url: String,
    /// Runtime version requested for the run.
    pub version: String,
    /// Total elapsed time in milliseconds.
    pub total_time_ms: i64,
    /// Peak resident memory in kilobytes.
    pub peak_memory_kb: i64,
    /// Qualitative score from analysis.
    pub score: String,
    /// Ordered improvement suggestions.
    pub suggestions: Vec<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Append / ordered-list / clear operations over completed runs.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends one completed run.
    async fn append(&self, record: &RunRecord) -> Result<(), DatabaseError>;

    /// Returns up to `limit` records, most recent first.
    async fn recent(&self, limit: i64) -> Result<Vec<RunRecord>, DatabaseError>;

    /// Removes all records, returning how many were deleted. Idempotent.
    async fn clear(&self) -> Result<u64, DatabaseError>;
}
