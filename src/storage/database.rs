//! PostgreSQL-backed history store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use thiserror::Error;
use uuid::Uuid;

use super::migrations::{MigrationError, MigrationRunner};
use super::{HistoryStore, RunRecord};

/// Errors that can occur during history-store operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Connection to the database failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
}

/// PostgreSQL history store.
pub struct PgHistoryStore {
    pool: PgPool,
}

impl PgHistoryStore {
    /// Connects to the database and returns a new store.
    ///
    /// # Arguments
    ///
    /// * `database_url` - PostgreSQL connection string
    pub async fn connect(database_url: &str) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(database_url)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Creates a store from an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs database migrations.
    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let runner = MigrationRunner::new(self.pool.clone());
        runner.run_migrations().await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn append(&self, record: &RunRecord) -> Result<(), DatabaseError> {
        let suggestions = serde_json::to_value(&record.suggestions)?;

        sqlx::query(
            r#"
            INSERT INTO profiling_runs (
                id, repo_url, version, total_time_ms, peak_memory_kb,
                score, suggestions, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(&record.repo_url)
        .bind(&record.version)
        .bind(record.total_time_ms)
        .bind(record.peak_memory_kb)
        .bind(&record.score)
        .bind(&suggestions)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<RunRecord>, DatabaseError> {
        let rows = sqlx::query(
            r#"
            SELECT id, repo_url, version, total_time_ms, peak_memory_kb,
                   score, suggestions, created_at
            FROM profiling_runs
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = row.get("id");
            let repo_url: String = row.get("repo_url");
            let version: String = row.get("version");
            let total_time_ms: i64 = row.get("total_time_ms");
            let peak_memory_kb: i64 = row.get("peak_memory_kb");
            let score: String = row.get("score");
            let suggestions_json: serde_json::Value = row.get("suggestions");
            let created_at: DateTime<Utc> = row.get("created_at");

            let suggestions: Vec<String> = serde_json::from_value(suggestions_json)?;

            records.push(RunRecord {
                id,
                repo_url,
                version,
                total_time_ms,
                peak_memory_kb,
                score,
                suggestions,
                created_at,
            });
        }

        Ok(records)
    }

    async fn clear(&self) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM profiling_runs")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
