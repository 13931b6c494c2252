//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (studyflow-infra) implements. The core crate never depends on any
//! specific storage technology. An in-memory implementation lives here for
//! tests and ephemeral runs.

pub mod checkpoint;
pub mod memory;
