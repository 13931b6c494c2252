//! In-memory checkpoint repository backed by `DashMap`.
//!
//! Each session's log lives in its own shard entry, so concurrent sessions
//! never contend on a shared lock. Contents are lost when the process exits.

use dashmap::DashMap;

use studyflow_types::checkpoint::{Checkpoint, SessionSummary};
use studyflow_types::error::RepositoryError;

use super::checkpoint::CheckpointRepository;

#[derive(Debug, Default)]
pub struct InMemoryCheckpointRepository {
    logs: DashMap<String, Vec<Checkpoint>>,
}

impl InMemoryCheckpointRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointRepository for InMemoryCheckpointRepository {
    async fn append(&self, checkpoint: &Checkpoint) -> Result<(), RepositoryError> {
        let mut log = self.logs.entry(checkpoint.session_id.clone()).or_default();
        if log.iter().any(|c| c.version == checkpoint.version) {
            return Err(RepositoryError::Conflict(format!(
                "session '{}' already has version {}",
                checkpoint.session_id, checkpoint.version
            )));
        }
        log.push(checkpoint.clone());
        log.sort_by_key(|c| c.version);
        Ok(())
    }

    async fn latest(&self, session_id: &str) -> Result<Option<Checkpoint>, RepositoryError> {
        Ok(self
            .logs
            .get(session_id)
            .and_then(|log| log.last().cloned()))
    }

    async fn history(&self, session_id: &str) -> Result<Vec<Checkpoint>, RepositoryError> {
        Ok(self
            .logs
            .get(session_id)
            .map(|log| log.value().clone())
            .unwrap_or_default())
    }

    async fn purge(&self, session_id: &str) -> Result<u64, RepositoryError> {
        Ok(self
            .logs
            .remove(session_id)
            .map(|(_, log)| log.len() as u64)
            .unwrap_or(0))
    }

    async fn list_sessions(&self, limit: usize) -> Result<Vec<SessionSummary>, RepositoryError> {
        let mut summaries: Vec<SessionSummary> = self
            .logs
            .iter()
            .filter_map(|entry| entry.value().last().map(|c| SessionSummary::from(&c.state)))
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries.truncate(limit);
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use studyflow_types::session::{SessionState, SessionStep};

    fn checkpoint(session_id: &str, version: u64, step: SessionStep) -> Checkpoint {
        let mut state = SessionState::new(session_id, "question", Utc::now());
        state.version = version;
        state.current_step = step;
        state.updated_at = state.created_at + Duration::seconds(version as i64);
        Checkpoint::snapshot(&state)
    }

    #[tokio::test]
    async fn history_is_oldest_first() {
        let repo = InMemoryCheckpointRepository::new();
        repo.append(&checkpoint("s1", 1, SessionStep::Start)).await.unwrap();
        repo.append(&checkpoint("s1", 3, SessionStep::Retrieval)).await.unwrap();
        repo.append(&checkpoint("s1", 2, SessionStep::Planner)).await.unwrap();

        let history = repo.history("s1").await.unwrap();
        let versions: Vec<u64> = history.iter().map(|c| c.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);

        let latest = repo.latest("s1").await.unwrap().unwrap();
        assert_eq!(latest.step, SessionStep::Retrieval);
    }

    #[tokio::test]
    async fn duplicate_version_conflicts() {
        let repo = InMemoryCheckpointRepository::new();
        repo.append(&checkpoint("s1", 1, SessionStep::Start)).await.unwrap();
        let err = repo
            .append(&checkpoint("s1", 1, SessionStep::Planner))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn unknown_session_is_empty() {
        let repo = InMemoryCheckpointRepository::new();
        assert!(repo.latest("nope").await.unwrap().is_none());
        assert!(repo.history("nope").await.unwrap().is_empty());
        assert_eq!(repo.purge("nope").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn purge_removes_only_target_session() {
        let repo = InMemoryCheckpointRepository::new();
        repo.append(&checkpoint("s1", 1, SessionStep::Start)).await.unwrap();
        repo.append(&checkpoint("s1", 2, SessionStep::Planner)).await.unwrap();
        repo.append(&checkpoint("s2", 1, SessionStep::Start)).await.unwrap();

        assert_eq!(repo.purge("s1").await.unwrap(), 2);
        assert!(repo.latest("s1").await.unwrap().is_none());
        assert!(repo.latest("s2").await.unwrap().is_some());
        assert_eq!(repo.list_sessions(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_sessions_newest_first_with_limit() {
        let repo = InMemoryCheckpointRepository::new();
        repo.append(&checkpoint("old", 1, SessionStep::Start)).await.unwrap();
        repo.append(&checkpoint("new", 5, SessionStep::Feedback)).await.unwrap();
        repo.append(&checkpoint("mid", 3, SessionStep::Retrieval)).await.unwrap();

        let all = repo.list_sessions(10).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);

        let limited = repo.list_sessions(1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].current_step, SessionStep::Feedback);
    }
}
