//! Step functions of the learning-session graph.
//!
//! Each step reads the fields it needs from an immutable `SessionState` and
//! returns a [`StepUpdate`](super::update::StepUpdate). Failures are returned
//! as [`StepError`] and turned into a recorded `Failed` update by the
//! [`StepRunner`](super::step_runner::StepRunner); they never abort the process.

pub mod feedback;
pub mod grading;
pub mod planner;
pub mod prompt;
pub mod quiz;
pub mod retrieval;

use studyflow_types::config::ModelConfig;
use studyflow_types::llm::{CompletionRequest, Message};

use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::structured::StructuredError;
use crate::retrieval::box_retriever::BoxRetriever;

/// Failure of a single step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// Model output did not meet the step's invariants.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The model call failed or returned unparseable output.
    #[error("generation failed: {0}")]
    Generation(String),

    /// A required input field is absent from the state.
    #[error("missing precondition: {0}")]
    Precondition(String),

    #[error("step timed out after {0}s")]
    Timeout(u64),
}

impl From<StructuredError> for StepError {
    fn from(e: StructuredError) -> Self {
        StepError::Generation(e.to_string())
    }
}

/// Capabilities and settings a step may use.
pub struct StepContext<'a> {
    pub llm: &'a BoxLlmProvider,
    pub retriever: &'a BoxRetriever,
    pub model: &'a ModelConfig,
    /// Number of primary retrieval hits requested.
    pub retrieval_k: usize,
}

impl StepContext<'_> {
    /// A single-turn request using the configured model settings.
    pub fn request(&self, system: String, user: String) -> CompletionRequest {
        CompletionRequest {
            model: self.model.model.clone(),
            messages: vec![Message::user(user)],
            system: Some(system),
            max_tokens: self.model.max_tokens,
            temperature: Some(self.model.temperature),
            stop_sequences: None,
            output_config: None,
        }
    }
}
