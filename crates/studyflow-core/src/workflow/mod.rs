//! Session workflow: the step graph, its step functions and the engine that
//! drives them with durable checkpointing.
//!
//! - `graph` -- the immutable study-session graph and its validation
//! - `steps` -- plan, retrieve, quiz, grade and feedback step functions
//! - `update` -- typed partial updates and the state merge policy
//! - `routing` -- the post-feedback retry/end decision
//! - `step_runner` -- dispatch, timeout and failure capture for one step
//! - `checkpoint` -- durable checkpoint manager
//! - `engine` -- start/resume/recover orchestration

pub mod checkpoint;
pub mod engine;
pub mod graph;
pub mod routing;
pub mod step_runner;
pub mod steps;
pub mod update;
