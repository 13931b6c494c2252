//! Event types for the StudyFlow session event bus.
//!
//! `SessionEvent` is broadcast while the engine drives a session. All
//! variants are Clone + Send + Sync for use with tokio broadcast channels.

use serde::{Deserialize, Serialize};

use crate::session::{SessionStep, StepName};

/// Lifecycle events emitted during session execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A new session was created.
    SessionStarted {
        session_id: String,
        user_question: String,
    },

    /// A step function is about to run.
    StepStarted { session_id: String, step: StepName },

    /// A step completed and its checkpoint was persisted.
    StepCompleted {
        session_id: String,
        step: StepName,
        current_step: SessionStep,
        duration_ms: u64,
    },

    /// Execution paused at the suspension point.
    SessionSuspended {
        session_id: String,
        retry_count: u32,
    },

    /// The routing function ended the session.
    SessionCompleted {
        session_id: String,
        score: Option<u8>,
        passed: bool,
    },

    /// A step failed and the session is now errored.
    StepFailed {
        session_id: String,
        step: StepName,
        error: String,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> &str {
        match self {
            SessionEvent::SessionStarted { session_id, .. }
            | SessionEvent::StepStarted { session_id, .. }
            | SessionEvent::StepCompleted { session_id, .. }
            | SessionEvent::SessionSuspended { session_id, .. }
            | SessionEvent::SessionCompleted { session_id, .. }
            | SessionEvent::StepFailed { session_id, .. } => session_id,
        }
    }

    /// Short wire name (used as the SSE `event:` field).
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::SessionStarted { .. } => "start",
            SessionEvent::StepStarted { .. } => "node_start",
            SessionEvent::StepCompleted { .. } => "node_end",
            SessionEvent::SessionSuspended { .. } => "suspended",
            SessionEvent::SessionCompleted { .. } => "complete",
            SessionEvent::StepFailed { .. } => "error",
        }
    }

    /// Whether no further events follow for this session until it is resumed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionEvent::SessionSuspended { .. }
                | SessionEvent::SessionCompleted { .. }
                | SessionEvent::StepFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let event = SessionEvent::StepStarted {
            session_id: "s1".to_string(),
            step: StepName::QuizGenerator,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "step_started");
        assert_eq!(json["step"], "quiz_generator");
        assert_eq!(event.kind(), "node_start");
        assert_eq!(event.session_id(), "s1");
        assert!(!event.is_terminal());
    }

    #[test]
    fn suspension_is_terminal() {
        let event = SessionEvent::SessionSuspended {
            session_id: "s1".to_string(),
            retry_count: 1,
        };
        assert!(event.is_terminal());
        assert_eq!(event.kind(), "suspended");
    }
}
