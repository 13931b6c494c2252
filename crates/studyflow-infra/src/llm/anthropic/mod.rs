//! Anthropic Claude model provider implementation.
//!
//! Provides [`AnthropicProvider`], which implements the
//! [`LlmProvider`](studyflow_core::llm::provider::LlmProvider) trait for the
//! Anthropic Messages API.

pub mod client;
pub mod types;

pub use client::AnthropicProvider;
