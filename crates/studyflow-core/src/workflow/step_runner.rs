//! Step runner for the five session steps.
//!
//! `StepRunner` owns the model provider and retriever, dispatches a
//! [`StepName`] to its step function, applies the optional step timeout and
//! converts any [`StepError`] into a recorded `Failed` update.

use std::time::{Duration, Instant};

use studyflow_types::config::{ModelConfig, StudyFlowConfig};
use studyflow_types::session::{SessionState, StepName};

use super::steps::{self, StepContext, StepError};
use super::update::StepUpdate;
use crate::llm::box_provider::BoxLlmProvider;
use crate::retrieval::box_retriever::BoxRetriever;

// ---------------------------------------------------------------------------
// EngineSettings
// ---------------------------------------------------------------------------

/// Runtime settings shared by every step.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub model: ModelConfig,
    /// Primary retrieval hit count.
    pub retrieval_k: usize,
    /// Per-step wall-clock limit. `None` means unbounded.
    pub step_timeout: Option<Duration>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            retrieval_k: 5,
            step_timeout: None,
        }
    }
}

impl From<&StudyFlowConfig> for EngineSettings {
    fn from(config: &StudyFlowConfig) -> Self {
        Self {
            model: config.model.clone(),
            retrieval_k: config.retrieval.top_k,
            step_timeout: config.engine.step_timeout_secs.map(Duration::from_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// StepRunner
// ---------------------------------------------------------------------------

/// Executes individual steps against the configured capabilities.
pub struct StepRunner {
    llm: BoxLlmProvider,
    retriever: BoxRetriever,
    settings: EngineSettings,
}

impl StepRunner {
    pub fn new(llm: BoxLlmProvider, retriever: BoxRetriever, settings: EngineSettings) -> Self {
        Self {
            llm,
            retriever,
            settings,
        }
    }

    /// Run one step. Never fails: errors come back as a `Failed` update.
    pub async fn run(&self, step: StepName, state: &SessionState) -> StepUpdate {
        let started = Instant::now();
        let result = match self.settings.step_timeout {
            Some(limit) => tokio::time::timeout(limit, self.dispatch(step, state))
                .await
                .unwrap_or(Err(StepError::Timeout(limit.as_secs()))),
            None => self.dispatch(step, state).await,
        };

        match result {
            Ok(update) => {
                tracing::debug!(
                    session_id = %state.session_id,
                    step = %step,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "step completed"
                );
                update
            }
            Err(e) => {
                tracing::error!(
                    session_id = %state.session_id,
                    step = %step,
                    error = %e,
                    "step failed"
                );
                StepUpdate::failed(step, &e)
            }
        }
    }

    async fn dispatch(&self, step: StepName, state: &SessionState) -> Result<StepUpdate, StepError> {
        let ctx = StepContext {
            llm: &self.llm,
            retriever: &self.retriever,
            model: &self.settings.model,
            retrieval_k: self.settings.retrieval_k,
        };
        match step {
            StepName::Planner => steps::planner::run(state, &ctx).await,
            StepName::Retrieval => steps::retrieval::run(state, &ctx).await,
            StepName::QuizGenerator => steps::quiz::run(state, &ctx).await,
            StepName::Grading => steps::grading::run(state, &ctx).await,
            StepName::Feedback => steps::feedback::run(state, &ctx).await,
        }
    }
}
