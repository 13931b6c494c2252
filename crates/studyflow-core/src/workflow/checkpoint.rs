//! Durable checkpoint manager for session state.
//!
//! Wraps `CheckpointRepository` to provide a higher-level API for recording
//! a snapshot after every step. A paused session can be resumed by any
//! process that shares the same store, because resume reconstructs state only
//! from the latest checkpoint.

use studyflow_types::checkpoint::{Checkpoint, HistoryEntry, SessionSummary};
use studyflow_types::error::RepositoryError;
use studyflow_types::session::SessionState;

use crate::repository::checkpoint::CheckpointRepository;

// ---------------------------------------------------------------------------
// CheckpointManager
// ---------------------------------------------------------------------------

/// Manages durable checkpoints for learning sessions.
///
/// Generic over `R: CheckpointRepository` so it works with any storage backend
/// (SQLite, in-memory, etc.).
pub struct CheckpointManager<R: CheckpointRepository> {
    repo: R,
}

impl<R: CheckpointRepository> CheckpointManager<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Bump the state's version and persist a snapshot of it.
    ///
    /// On failure the version is restored so the in-memory state still
    /// matches the store.
    pub async fn save(&self, state: &mut SessionState) -> Result<Checkpoint, CheckpointError> {
        state.version += 1;
        let checkpoint = Checkpoint::snapshot(state);

        if let Err(e) = self.repo.append(&checkpoint).await {
            state.version -= 1;
            return Err(e.into());
        }

        tracing::debug!(
            session_id = %checkpoint.session_id,
            version = checkpoint.version,
            step = %checkpoint.step,
            status = %checkpoint.status,
            checkpoint_id = %checkpoint.id,
            "checkpointed session"
        );

        Ok(checkpoint)
    }

    /// State from the latest checkpoint, if the session exists.
    pub async fn load_latest(&self, session_id: &str) -> Result<Option<SessionState>, CheckpointError> {
        let latest = self.repo.latest(session_id).await?;
        Ok(latest.map(|c| c.state))
    }

    /// Checkpoint history, oldest first.
    pub async fn history(&self, session_id: &str) -> Result<Vec<HistoryEntry>, CheckpointError> {
        let checkpoints = self.repo.history(session_id).await?;
        Ok(checkpoints.iter().map(Checkpoint::history_entry).collect())
    }

    /// Remove every checkpoint of a session.
    pub async fn purge(&self, session_id: &str) -> Result<u64, CheckpointError> {
        let removed = self.repo.purge(session_id).await?;
        tracing::debug!(session_id, removed, "purged session checkpoints");
        Ok(removed)
    }

    pub async fn list_sessions(&self, limit: usize) -> Result<Vec<SessionSummary>, CheckpointError> {
        Ok(self.repo.list_sessions(limit).await?)
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Underlying repository operation failed.
    #[error("checkpoint repository error: {0}")]
    Repository(#[from] RepositoryError),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::InMemoryCheckpointRepository;
    use chrono::Utc;
    use studyflow_types::session::SessionStep;

    #[tokio::test]
    async fn save_bumps_version_and_history_grows() {
        let manager = CheckpointManager::new(InMemoryCheckpointRepository::new());
        let mut state = SessionState::new("s1", "q", Utc::now());

        manager.save(&mut state).await.unwrap();
        state.current_step = SessionStep::Planner;
        manager.save(&mut state).await.unwrap();

        assert_eq!(state.version, 2);
        let history = manager.history("s1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].step, SessionStep::Start);
        assert_eq!(history[1].step, SessionStep::Planner);

        let latest = manager.load_latest("s1").await.unwrap();
        assert_eq!(latest, Some(state));
    }

    #[tokio::test]
    async fn failed_save_restores_version() {
        let manager = CheckpointManager::new(InMemoryCheckpointRepository::new());
        let mut state = SessionState::new("s1", "q", Utc::now());
        manager.save(&mut state).await.unwrap();

        // Rewind to force a duplicate version.
        state.version = 0;
        let err = manager.save(&mut state).await.unwrap_err();
        assert!(matches!(err, CheckpointError::Repository(RepositoryError::Conflict(_))));
        assert_eq!(state.version, 0);
    }

    #[tokio::test]
    async fn missing_session_loads_nothing() {
        let manager = CheckpointManager::new(InMemoryCheckpointRepository::new());
        assert!(manager.load_latest("ghost").await.unwrap().is_none());
        assert!(manager.history("ghost").await.unwrap().is_empty());
    }

    #[test]
    fn checkpoint_error_display() {
        let err = CheckpointError::from(RepositoryError::Query("connection lost".to_string()));
        assert!(err.to_string().contains("connection lost"));
    }
}
