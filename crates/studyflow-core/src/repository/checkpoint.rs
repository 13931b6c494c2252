//! Checkpoint repository trait definition.
//!
//! An append-only log of session snapshots keyed by session id. The
//! infrastructure layer implements it with SQLite; `memory` provides a
//! DashMap-backed version.

use studyflow_types::checkpoint::{Checkpoint, SessionSummary};
use studyflow_types::error::RepositoryError;

/// Repository trait for checkpoint persistence.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait CheckpointRepository: Send + Sync {
    /// Append a checkpoint. Fails with `Conflict` if the session already has
    /// a checkpoint with the same version.
    fn append(
        &self,
        checkpoint: &Checkpoint,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// The checkpoint with the highest version for a session.
    fn latest(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Checkpoint>, RepositoryError>> + Send;

    /// Every checkpoint of a session, oldest first (ascending version).
    fn history(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Checkpoint>, RepositoryError>> + Send;

    /// Delete every checkpoint of a session. Returns how many were removed.
    fn purge(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Most recently updated sessions first, built from their latest checkpoint.
    fn list_sessions(
        &self,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<SessionSummary>, RepositoryError>> + Send;
}
