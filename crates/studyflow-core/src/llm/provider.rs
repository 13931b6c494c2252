//! LlmProvider trait definition.
//!
//! This is the core abstraction that every model provider implements. Steps
//! only ever see it through [`BoxLlmProvider`](super::box_provider::BoxLlmProvider).

use studyflow_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Trait for model provider backends (Anthropic, test doubles, ...).
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
/// Implementations live in studyflow-infra (e.g., `AnthropicProvider`).
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "anthropic").
    fn name(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
