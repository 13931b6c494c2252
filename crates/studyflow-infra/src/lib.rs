//! Infrastructure layer for StudyFlow.
//!
//! Contains implementations of the traits defined in `studyflow-core`:
//! SQLite checkpoint storage, the Anthropic model provider and the local
//! corpus retriever, plus configuration loading.

pub mod config;
pub mod llm;
pub mod retrieval;
pub mod sqlite;
