//! Model provider abstractions for StudyFlow.
//!
//! - `LlmProvider`: RPITIT trait for concrete provider implementations
//! - `BoxLlmProvider`: object-safe wrapper for dynamic dispatch
//! - `structured`: JSON-schema constrained calls parsed into typed values

pub mod box_provider;
pub mod provider;
pub mod structured;
