//! Learning session service.
//!
//! Wraps the [`SessionEngine`] with id generation and the response shapes
//! consumed by the CLI and the HTTP API. A call that leaves the session
//! errored is reported as [`EngineError::StepFailed`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use studyflow_types::checkpoint::{HistoryEntry, SessionSummary};
use studyflow_types::session::{
    AnswerMap, LearningPlan, PASS_THRESHOLD, Quiz, ScoreDetail, SessionState, SessionStatus,
    SessionStep,
};

use crate::repository::checkpoint::CheckpointRepository;
use crate::workflow::engine::{EngineError, SessionEngine};

/// Generate a session id of the form `study_<12 hex chars>`.
pub fn new_session_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("study_{}", &hex[..12])
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

/// Result of starting a session: the plan and the first quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    pub session_id: String,
    pub status: SessionStatus,
    pub current_step: SessionStep,
    pub learning_plan: Option<LearningPlan>,
    pub quiz: Option<Quiz>,
    pub message: String,
}

/// How an answer submission ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitOutcome {
    /// Score too low; a new quiz is waiting.
    Retry,
    /// Passed.
    Completed,
    /// Retries exhausted without passing.
    Failed,
}

impl SubmitOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitOutcome::Retry => "retry",
            SubmitOutcome::Completed => "completed",
            SubmitOutcome::Failed => "failed",
        }
    }
}

/// Result of a graded attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub session_id: String,
    pub status: SubmitOutcome,
    pub score: Option<u8>,
    pub score_detail: Option<ScoreDetail>,
    pub feedback: Option<String>,
    pub should_retry: bool,
    /// The freshly generated quiz when retrying.
    pub quiz: Option<Quiz>,
    pub retry_count: u32,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub session_id: String,
    pub current_step: SessionStep,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub state: SessionState,
}

impl From<SessionState> for StatusResponse {
    fn from(state: SessionState) -> Self {
        Self {
            session_id: state.session_id.clone(),
            current_step: state.current_step,
            status: state.status,
            created_at: state.created_at,
            updated_at: state.updated_at,
            state,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: String,
    /// Oldest first.
    pub history: Vec<HistoryEntry>,
}

// ---------------------------------------------------------------------------
// SessionService
// ---------------------------------------------------------------------------

pub struct SessionService<R: CheckpointRepository> {
    engine: Arc<SessionEngine<R>>,
}

impl<R: CheckpointRepository> Clone for SessionService<R> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<R: CheckpointRepository> SessionService<R> {
    pub fn new(engine: Arc<SessionEngine<R>>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &SessionEngine<R> {
        &self.engine
    }

    /// Start a session, generating an id when none (or a blank one) is given.
    pub async fn start(
        &self,
        session_id: Option<String>,
        user_question: &str,
    ) -> Result<StartResponse, EngineError> {
        let session_id = session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(new_session_id);

        let state = self.engine.start(&session_id, user_question).await?;
        ensure_not_errored(&state)?;

        Ok(StartResponse {
            session_id,
            status: state.status,
            current_step: state.current_step,
            learning_plan: state.learning_plan,
            quiz: state.quiz,
            message: "Learning plan and quiz are ready. Submit your answers to continue.".to_string(),
        })
    }

    /// Submit answers and report the outcome of the graded attempt.
    pub async fn submit_answers(
        &self,
        session_id: &str,
        answers: AnswerMap,
    ) -> Result<SubmitResponse, EngineError> {
        let state = self.engine.resume(session_id, answers).await?;
        ensure_not_errored(&state)?;

        let attempt = state.last_attempt().ok_or_else(|| {
            EngineError::InvalidState(format!("session '{session_id}' has no graded attempt"))
        })?;

        let status = if attempt.should_retry {
            SubmitOutcome::Retry
        } else if attempt.score >= PASS_THRESHOLD {
            SubmitOutcome::Completed
        } else {
            SubmitOutcome::Failed
        };
        let message = match status {
            SubmitOutcome::Retry => "Score below the pass mark. A new quiz is ready.",
            SubmitOutcome::Completed => "Congratulations, you passed the quiz!",
            SubmitOutcome::Failed => {
                "Maximum retries reached. Review the material before trying again."
            }
        };

        tracing::info!(session_id, status = status.as_str(), score = attempt.score, "answers processed");

        Ok(SubmitResponse {
            session_id: session_id.to_string(),
            status,
            score: Some(attempt.score),
            score_detail: Some(attempt.score_detail()),
            feedback: Some(attempt.feedback.clone()),
            should_retry: attempt.should_retry,
            quiz: if status == SubmitOutcome::Retry {
                state.quiz.clone()
            } else {
                None
            },
            retry_count: state.retry_count,
            message: message.to_string(),
        })
    }

    pub async fn get_status(&self, session_id: &str) -> Result<StatusResponse, EngineError> {
        self.engine
            .get_state(session_id)
            .await?
            .map(StatusResponse::from)
            .ok_or_else(|| EngineError::NotFound(session_id.to_string()))
    }

    pub async fn get_history(&self, session_id: &str) -> Result<HistoryResponse, EngineError> {
        let history = self.engine.get_history(session_id).await?;
        if history.is_empty() {
            return Err(EngineError::NotFound(session_id.to_string()));
        }
        Ok(HistoryResponse {
            session_id: session_id.to_string(),
            history,
        })
    }

    /// Re-run the failed step of an errored session, or continue one that
    /// was interrupted between steps.
    pub async fn recover(&self, session_id: &str) -> Result<StatusResponse, EngineError> {
        let state = self.engine.recover(session_id).await?;
        ensure_not_errored(&state)?;
        Ok(StatusResponse::from(state))
    }

    pub async fn delete(&self, session_id: &str) -> Result<(), EngineError> {
        self.engine.delete(session_id).await
    }

    pub async fn list_sessions(&self, limit: usize) -> Result<Vec<SessionSummary>, EngineError> {
        self.engine.list_sessions(limit).await
    }
}

fn ensure_not_errored(state: &SessionState) -> Result<(), EngineError> {
    match (state.error_step, &state.error) {
        (Some(step), Some(error)) => Err(EngineError::StepFailed {
            step,
            error: error.clone(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventBus;
    use crate::llm::box_provider::BoxLlmProvider;
    use crate::repository::memory::InMemoryCheckpointRepository;
    use crate::retrieval::box_retriever::{BoxRetriever, NoIndexRetriever};
    use crate::testing::{MockLlm, Reply, objective_answers, perfect_answers};
    use crate::workflow::step_runner::{EngineSettings, StepRunner};
    use studyflow_types::session::StepName;

    fn service(llm: MockLlm) -> SessionService<InMemoryCheckpointRepository> {
        let runner = StepRunner::new(
            BoxLlmProvider::new(llm),
            BoxRetriever::new(NoIndexRetriever),
            EngineSettings::default(),
        );
        let engine =
            SessionEngine::new(InMemoryCheckpointRepository::new(), runner, EventBus::default())
                .unwrap();
        SessionService::new(Arc::new(engine))
    }

    #[test]
    fn generated_ids_have_prefix_and_length() {
        let id = new_session_id();
        assert!(id.starts_with("study_"));
        assert_eq!(id.len(), "study_".len() + 12);
        assert!(id["study_".len()..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, new_session_id());
    }

    #[tokio::test]
    async fn start_generates_id_when_blank() {
        let service = service(MockLlm::new());
        let started = service.start(Some("  ".to_string()), "What is a borrow?").await.unwrap();
        assert!(started.session_id.starts_with("study_"));
        assert_eq!(started.status, SessionStatus::Suspended);
        assert_eq!(started.current_step, SessionStep::WaitingForAnswers);
        assert!(started.quiz.is_some());
        assert!(started.learning_plan.is_some());
    }

    #[tokio::test]
    async fn submit_reports_completed() {
        let service = service(MockLlm::new());
        service.start(Some("s1".to_string()), "q").await.unwrap();
        let result = service.submit_answers("s1", perfect_answers()).await.unwrap();

        assert_eq!(result.status, SubmitOutcome::Completed);
        assert_eq!(result.score, Some(100));
        assert_eq!(result.score_detail.unwrap().correct_count, 5);
        assert!(result.quiz.is_none());
        assert!(!result.should_retry);
    }

    #[tokio::test]
    async fn submit_reports_retry_with_new_quiz() {
        let service = service(MockLlm::new());
        service.start(Some("s1".to_string()), "q").await.unwrap();
        let result = service.submit_answers("s1", objective_answers(0)).await.unwrap();

        assert_eq!(result.status, SubmitOutcome::Retry);
        assert_eq!(result.score, Some(0));
        assert!(result.should_retry);
        assert!(result.quiz.is_some());
        assert_eq!(result.retry_count, 1);
        assert_eq!(result.score_detail.unwrap().question_scores.len(), 5);
    }

    #[tokio::test]
    async fn submit_reports_failed_after_retries() {
        let service = service(MockLlm::new());
        service.start(Some("s1".to_string()), "q").await.unwrap();
        let mut last = None;
        for _ in 0..4 {
            last = Some(service.submit_answers("s1", objective_answers(2)).await.unwrap());
        }
        let last = last.unwrap();
        assert_eq!(last.status, SubmitOutcome::Failed);
        assert_eq!(last.score, Some(40));
        assert!(!last.should_retry);
    }

    #[tokio::test]
    async fn step_failure_surfaces_as_step_failed() {
        let llm = MockLlm::new();
        llm.push_plan(Reply::Fail("no credits".to_string()));
        let service = service(llm);

        let err = service.start(Some("s1".to_string()), "q").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::StepFailed { step: StepName::Planner, .. }
        ));

        let status = service.get_status("s1").await.unwrap();
        assert_eq!(status.status, SessionStatus::Errored);
        assert_eq!(status.current_step, SessionStep::PlannerError);

        let recovered = service.recover("s1").await.unwrap();
        assert_eq!(recovered.status, SessionStatus::Suspended);
    }

    #[tokio::test]
    async fn unknown_sessions_are_not_found() {
        let service = service(MockLlm::new());
        assert!(matches!(
            service.get_status("nope").await.unwrap_err(),
            EngineError::NotFound(_)
        ));
        assert!(matches!(
            service.get_history("nope").await.unwrap_err(),
            EngineError::NotFound(_)
        ));
        assert!(matches!(
            service.delete("nope").await.unwrap_err(),
            EngineError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn history_is_oldest_first() {
        let service = service(MockLlm::new());
        service.start(Some("s1".to_string()), "q").await.unwrap();
        let history = service.get_history("s1").await.unwrap().history;
        assert_eq!(history.first().unwrap().step, SessionStep::Start);
        assert_eq!(history.last().unwrap().step, SessionStep::WaitingForAnswers);
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }
}
