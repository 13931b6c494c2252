//! SQLite checkpoint repository implementation.
//!
//! Implements `CheckpointRepository` from `studyflow-core` using sqlx with
//! split read/write pools. Each checkpoint is one row holding the full
//! session state as a JSON blob; `(session_id, version)` is unique.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use studyflow_core::repository::checkpoint::CheckpointRepository;
use studyflow_types::checkpoint::{Checkpoint, SessionSummary};
use studyflow_types::error::RepositoryError;
use studyflow_types::session::{SessionState, SessionStatus, SessionStep};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `CheckpointRepository`.
pub struct SqliteCheckpointRepository {
    pool: DatabasePool,
}

impl SqliteCheckpointRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row type
// ---------------------------------------------------------------------------

struct CheckpointRow {
    id: String,
    session_id: String,
    version: i64,
    step: String,
    status: String,
    state: String,
    created_at: String,
}

impl CheckpointRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            version: row.try_get("version")?,
            step: row.try_get("step")?,
            status: row.try_get("status")?,
            state: row.try_get("state")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_checkpoint(self) -> Result<Checkpoint, RepositoryError> {
        let step: SessionStep = self.step.parse().map_err(RepositoryError::Query)?;
        let status: SessionStatus = self.status.parse().map_err(RepositoryError::Query)?;
        let state: SessionState = serde_json::from_str(&self.state)
            .map_err(|e| RepositoryError::Query(format!("invalid state JSON: {e}")))?;

        Ok(Checkpoint {
            id: parse_uuid(&self.id)?,
            session_id: self.session_id,
            version: self.version as u64,
            step,
            status,
            state,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn decode_rows(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<Checkpoint>, RepositoryError> {
    let mut checkpoints = Vec::with_capacity(rows.len());
    for row in rows {
        let r = CheckpointRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
        checkpoints.push(r.into_checkpoint()?);
    }
    Ok(checkpoints)
}

// ---------------------------------------------------------------------------
// CheckpointRepository impl
// ---------------------------------------------------------------------------

impl CheckpointRepository for SqliteCheckpointRepository {
    async fn append(&self, checkpoint: &Checkpoint) -> Result<(), RepositoryError> {
        let state_json = serde_json::to_string(&checkpoint.state)
            .map_err(|e| RepositoryError::Query(format!("serialize state: {e}")))?;

        let result = sqlx::query(
            "INSERT INTO checkpoints (id, session_id, version, step, status, state, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(checkpoint.id.to_string())
        .bind(&checkpoint.session_id)
        .bind(checkpoint.version as i64)
        .bind(checkpoint.step.as_str())
        .bind(checkpoint.status.as_str())
        .bind(&state_json)
        .bind(format_datetime(&checkpoint.created_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => {
                Err(RepositoryError::Conflict(format!(
                    "session '{}' already has version {}",
                    checkpoint.session_id, checkpoint.version
                )))
            }
            Err(e) => Err(RepositoryError::Query(e.to_string())),
        }
    }

    async fn latest(&self, session_id: &str) -> Result<Option<Checkpoint>, RepositoryError> {
        let row = sqlx::query(
            "SELECT * FROM checkpoints WHERE session_id = ? ORDER BY version DESC LIMIT 1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r = CheckpointRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(r.into_checkpoint()?))
            }
            None => Ok(None),
        }
    }

    async fn history(&self, session_id: &str) -> Result<Vec<Checkpoint>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM checkpoints WHERE session_id = ? ORDER BY version ASC")
            .bind(session_id)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        decode_rows(&rows)
    }

    async fn purge(&self, session_id: &str) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM checkpoints WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn list_sessions(&self, limit: usize) -> Result<Vec<SessionSummary>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT c.* FROM checkpoints c
             JOIN (SELECT session_id, MAX(version) AS version FROM checkpoints GROUP BY session_id) latest
               ON c.session_id = latest.session_id AND c.version = latest.version
             ORDER BY c.created_at DESC
             LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(decode_rows(&rows)?
            .iter()
            .map(|c| SessionSummary::from(&c.state))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
