//! Session engine, step functions and port traits for StudyFlow.
//!
//! This crate defines the "ports" (repository, model and retriever traits)
//! that the infrastructure layer implements. It depends only on
//! `studyflow-types` -- never on `studyflow-infra` or any database/IO crate.

pub mod event;
pub mod llm;
pub mod repository;
pub mod retrieval;
pub mod service;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;
