//! Session engine: drives a learning session through the step graph with
//! durable checkpointing.
//!
//! # Execution flow
//!
//! 1. `start` creates a fresh state, checkpoints it and runs
//!    Plan -> Retrieve -> GenerateQuiz, checkpointing after each step.
//! 2. Reaching the human-review node persists a suspended checkpoint and
//!    returns.
//! 3. `resume` merges the answers into the latest checkpoint and runs
//!    Grade -> Feedback, then follows the routing decision: back to
//!    GenerateQuiz (and suspend again) or to End.
//! 4. A failed step is recorded in state and checkpointed; the session then
//!    refuses `resume` until `recover` re-runs the failed step. A session
//!    whose latest checkpoint is still `running` (a checkpoint write failed
//!    or the process died between steps) is also recoverable: it continues
//!    from the node after its last committed step.
//!
//! Calls for one session are serialized by a per-session async mutex. The
//! lock entry is dropped once no call holds or waits on it. Distinct
//! sessions never share mutable state.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;

use studyflow_types::checkpoint::{HistoryEntry, SessionSummary};
use studyflow_types::event::SessionEvent;
use studyflow_types::session::{
    AnswerMap, PASS_THRESHOLD, SessionState, SessionStatus, SessionStep, StepName,
};

use super::checkpoint::{CheckpointError, CheckpointManager};
use super::graph::{Edge, GraphError, Node, StepGraph};
use super::routing::{Route, should_continue};
use super::step_runner::StepRunner;
use super::update::{SessionStateExt, StateChange, StepUpdate};
use crate::event::EventBus;
use crate::repository::checkpoint::CheckpointRepository;

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("session not found: {0}")]
    NotFound(String),

    /// The session is not in a state that allows the requested operation.
    #[error("invalid session state: {0}")]
    InvalidState(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A step failed and the session is now errored.
    #[error("step '{step}' failed: {error}")]
    StepFailed { step: StepName, error: String },
}

// ---------------------------------------------------------------------------
// SessionEngine
// ---------------------------------------------------------------------------

/// Drives learning sessions through the study-session graph.
///
/// Generic over `R: CheckpointRepository` so it works with any storage
/// backend. Built once and shared behind an `Arc`.
pub struct SessionEngine<R: CheckpointRepository> {
    checkpoints: CheckpointManager<R>,
    runner: StepRunner,
    graph: StepGraph,
    events: EventBus,
    /// Per-session locks serializing start/resume/recover/delete.
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<R: CheckpointRepository> SessionEngine<R> {
    pub fn new(repo: R, runner: StepRunner, events: EventBus) -> Result<Self, EngineError> {
        let graph = StepGraph::study_session();
        graph.validate()?;
        Ok(Self {
            checkpoints: CheckpointManager::new(repo),
            runner,
            graph,
            events,
            locks: DashMap::new(),
        })
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    /// Drop the map entry when only the map still holds the lock.
    fn release_lock(&self, session_id: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.locks
            .remove_if(session_id, |_, l| Arc::strong_count(l) <= 1);
    }

    /// Create a session and run it up to the suspension point.
    pub async fn start(&self, session_id: &str, user_question: &str) -> Result<SessionState, EngineError> {
        if session_id.trim().is_empty() {
            return Err(EngineError::Validation("session id must not be empty".to_string()));
        }
        if user_question.trim().is_empty() {
            return Err(EngineError::Validation("question must not be empty".to_string()));
        }

        let lock = self.session_lock(session_id);
        let result = {
            let _guard = lock.lock().await;
            self.start_locked(session_id, user_question).await
        };
        self.release_lock(session_id, lock);
        result
    }

    async fn start_locked(&self, session_id: &str, user_question: &str) -> Result<SessionState, EngineError> {
        if self.checkpoints.load_latest(session_id).await?.is_some() {
            return Err(EngineError::InvalidState(format!(
                "session '{session_id}' already exists"
            )));
        }

        let mut state = SessionState::new(session_id, user_question, Utc::now());
        self.checkpoints.save(&mut state).await?;

        tracing::info!(session_id, "session started");
        self.events.publish(SessionEvent::SessionStarted {
            session_id: session_id.to_string(),
            user_question: user_question.to_string(),
        });

        self.drive(state, self.graph.entry()).await
    }

    /// Submit answers to a suspended session and continue until it suspends
    /// again or ends.
    pub async fn resume(&self, session_id: &str, answers: AnswerMap) -> Result<SessionState, EngineError> {
        let lock = self.session_lock(session_id);
        let result = {
            let _guard = lock.lock().await;
            self.resume_locked(session_id, answers).await
        };
        self.release_lock(session_id, lock);
        result
    }

    async fn resume_locked(&self, session_id: &str, answers: AnswerMap) -> Result<SessionState, EngineError> {
        let mut state = self
            .checkpoints
            .load_latest(session_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(session_id.to_string()))?;

        if let (Some(error), Some(step)) = (&state.error, state.error_step) {
            return Err(EngineError::InvalidState(format!(
                "session '{session_id}' failed at {step} ({error}); recover it first"
            )));
        }
        if !state.is_suspended() {
            return Err(EngineError::InvalidState(format!(
                "session '{session_id}' is not waiting for answers (status: {})",
                state.status
            )));
        }
        if answers.is_empty() {
            return Err(EngineError::Validation("no answers submitted".to_string()));
        }

        let count = answers.len();
        state.apply(
            StepUpdate::new(StateChange::AnswersSubmitted(answers))
                .with_note(format!("{count} answers submitted")),
            Utc::now(),
        );
        tracing::info!(session_id, answers = count, retry_count = state.retry_count, "session resumed");

        let target = self.graph.resume_target()?;
        self.drive(state, target).await
    }

    /// Clear the recorded failure of an errored session and re-run the
    /// failed step, or continue a session interrupted between steps.
    pub async fn recover(&self, session_id: &str) -> Result<SessionState, EngineError> {
        let lock = self.session_lock(session_id);
        let result = {
            let _guard = lock.lock().await;
            self.recover_locked(session_id).await
        };
        self.release_lock(session_id, lock);
        result
    }

    async fn recover_locked(&self, session_id: &str) -> Result<SessionState, EngineError> {
        let mut state = self
            .checkpoints
            .load_latest(session_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(session_id.to_string()))?;

        let (node, note) = if let Some(step) = state.error_step {
            (Node::for_step(step), format!("Retrying {step} after failure"))
        } else if let Some(node) = self.interrupted_target(&state)? {
            (node, format!("Continuing after interrupted {}", state.current_step))
        } else {
            return Err(EngineError::InvalidState(format!(
                "session '{session_id}' has no failed step to recover (status: {})",
                state.status
            )));
        };

        state.apply(StepUpdate::new(StateChange::ErrorCleared).with_note(note), Utc::now());
        tracing::info!(session_id, node = ?node, "recovering session");

        self.drive(state, node).await
    }

    /// Where a `running` session stopped. Under the session lock a `running`
    /// latest checkpoint means the previous call never finished.
    fn interrupted_target(&self, state: &SessionState) -> Result<Option<Node>, EngineError> {
        if state.status != SessionStatus::Running {
            return Ok(None);
        }
        if state.current_step == SessionStep::Start {
            return Ok(Some(self.graph.entry()));
        }
        let Some(step) = StepName::completed_by(state.current_step) else {
            return Ok(None);
        };
        Ok(Some(match self.graph.edge(Node::for_step(step))? {
            Edge::Next(next) => next,
            // Feedback is only left `running` when the retry edge was taken.
            Edge::Route { retry, .. } => retry,
        }))
    }

    /// State from the latest checkpoint.
    pub async fn get_state(&self, session_id: &str) -> Result<Option<SessionState>, EngineError> {
        Ok(self.checkpoints.load_latest(session_id).await?)
    }

    /// Checkpoint history, oldest first. Empty for unknown sessions.
    pub async fn get_history(&self, session_id: &str) -> Result<Vec<HistoryEntry>, EngineError> {
        Ok(self.checkpoints.history(session_id).await?)
    }

    /// Purge every checkpoint of a session.
    pub async fn delete(&self, session_id: &str) -> Result<(), EngineError> {
        let lock = self.session_lock(session_id);
        let removed = {
            let _guard = lock.lock().await;
            self.checkpoints.purge(session_id).await
        };
        self.release_lock(session_id, lock);

        let removed = removed?;
        if removed == 0 {
            return Err(EngineError::NotFound(session_id.to_string()));
        }
        tracing::info!(session_id, removed, "session deleted");
        Ok(())
    }

    /// Most recently updated sessions first.
    pub async fn list_sessions(&self, limit: usize) -> Result<Vec<SessionSummary>, EngineError> {
        Ok(self.checkpoints.list_sessions(limit).await?)
    }

    // -----------------------------------------------------------------------
    // Graph traversal
    // -----------------------------------------------------------------------

    async fn drive(&self, mut state: SessionState, mut node: Node) -> Result<SessionState, EngineError> {
        let session_id = state.session_id.clone();

        loop {
            if node == self.graph.interrupt_node() {
                state.apply(
                    StepUpdate::new(StateChange::Suspended).with_note("Waiting for answers"),
                    Utc::now(),
                );
                self.checkpoints.save(&mut state).await?;
                tracing::info!(
                    session_id = %session_id,
                    retry_count = state.retry_count,
                    version = state.version,
                    "session suspended, waiting for answers"
                );
                self.events.publish(SessionEvent::SessionSuspended {
                    session_id: session_id.clone(),
                    retry_count: state.retry_count,
                });
                return Ok(state);
            }

            let Some(step) = node.step() else {
                return Ok(state);
            };

            self.events.publish(SessionEvent::StepStarted {
                session_id: session_id.clone(),
                step,
            });
            let started = Instant::now();
            let update = self.runner.run(step, &state).await;

            if update.is_failure() {
                state.apply(update, Utc::now());
                self.checkpoints.save(&mut state).await?;
                self.events.publish(SessionEvent::StepFailed {
                    session_id: session_id.clone(),
                    step,
                    error: state.error.clone().unwrap_or_default(),
                });
                return Ok(state);
            }
            state.apply(update, Utc::now());

            let next = match self.graph.edge(node)? {
                Edge::Next(next) => next,
                Edge::Route { retry, end } => {
                    let route = should_continue(&state);
                    tracing::debug!(
                        session_id = %session_id,
                        route = ?route,
                        score = ?state.score,
                        retry_count = state.retry_count,
                        "routing after feedback"
                    );
                    match route {
                        Route::Retry => {
                            state.apply(
                                StepUpdate::new(StateChange::RetryScheduled)
                                    .with_note("Generating a new quiz"),
                                Utc::now(),
                            );
                            retry
                        }
                        Route::End => {
                            state.apply(StepUpdate::new(StateChange::Terminated), Utc::now());
                            end
                        }
                    }
                }
            };

            self.checkpoints.save(&mut state).await?;
            self.events.publish(SessionEvent::StepCompleted {
                session_id: session_id.clone(),
                step,
                current_step: state.current_step,
                duration_ms: started.elapsed().as_millis() as u64,
            });

            if next == Node::End {
                let passed = state.score.is_some_and(|s| s >= PASS_THRESHOLD);
                tracing::info!(
                    session_id = %session_id,
                    score = ?state.score,
                    passed,
                    attempts = state.attempts.len(),
                    "session completed"
                );
                self.events.publish(SessionEvent::SessionCompleted {
                    session_id: session_id.clone(),
                    score: state.score,
                    passed,
                });
            }
            node = next;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
