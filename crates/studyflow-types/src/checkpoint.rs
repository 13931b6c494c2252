//! Checkpoint records persisted after every workflow step.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::{SessionState, SessionStatus, SessionStep};

/// Immutable snapshot of a session taken after a step.
///
/// `version` equals `state.version` and is unique per session; history is
/// ordered by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: Uuid,
    pub session_id: String,
    pub version: u64,
    pub step: SessionStep,
    pub status: SessionStatus,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Snapshot the given state under a fresh time-ordered id.
    pub fn snapshot(state: &SessionState) -> Self {
        Self {
            id: Uuid::now_v7(),
            session_id: state.session_id.clone(),
            version: state.version,
            step: state.current_step,
            status: state.status,
            state: state.clone(),
            created_at: state.updated_at,
        }
    }

    pub fn history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            checkpoint_id: self.id,
            step: self.step,
            timestamp: self.created_at,
        }
    }
}

/// One line of a session's checkpoint history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub checkpoint_id: Uuid,
    pub step: SessionStep,
    pub timestamp: DateTime<Utc>,
}

/// Listing row for stored sessions, built from their latest checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub user_question: String,
    pub current_step: SessionStep,
    pub status: SessionStatus,
    pub version: u64,
    pub retry_count: u32,
    pub score: Option<u8>,
    pub updated_at: DateTime<Utc>,
}

impl From<&SessionState> for SessionSummary {
    fn from(state: &SessionState) -> Self {
        Self {
            session_id: state.session_id.clone(),
            user_question: state.user_question.clone(),
            current_step: state.current_step,
            status: state.status,
            version: state.version,
            retry_count: state.retry_count,
            score: state.score,
            updated_at: state.updated_at,
        }
    }
}
