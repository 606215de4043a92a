//! Schema management for the history store.

use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur during migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Database query failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Applies the history-store schema.
pub struct MigrationRunner {
    pool: PgPool,
}

impl MigrationRunner {
    /// Creates a new migration runner over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs all schema statements. Idempotent thanks to IF NOT EXISTS.
    pub async fn run_migrations(&self) -> Result<(), MigrationError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiling_runs (
                id UUID PRIMARY KEY,
                repo_url TEXT NOT NULL,
                version TEXT NOT NULL DEFAULT '',
                total_time_ms BIGINT NOT NULL,
                peak_memory_kb BIGINT NOT NULL,
                score TEXT NOT NULL DEFAULT '',
                suggestions JSONB NOT NULL DEFAULT '[]',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_profiling_runs_created_at
                ON profiling_runs (created_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
