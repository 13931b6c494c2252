//! Shared domain types for StudyFlow.
//!
//! This crate contains the domain types used across the StudyFlow workspace:
//! session state, checkpoints, model requests, retrieval results, events,
//! configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror, schemars.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod event;
pub mod llm;
pub mod retrieval;
pub mod session;
