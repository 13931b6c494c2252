//! SSE feed of session events.
//!
//! GET /api/v1/sessions/{id}/events
//!
//! Streams the engine's [`SessionEvent`]s for one session as Server-Sent
//! Events. The session need not exist yet, so a client can subscribe with a
//! chosen id before starting it. The stream stays open across suspensions
//! until the client disconnects.
//!
//! SSE event names:
//! - `start` - session created
//! - `node_start` - a step is about to run
//! - `node_end` - a step finished and was checkpointed
//! - `suspended` - waiting for answers
//! - `complete` - the session ended
//! - `error` - a step failed

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};

use studyflow_types::event::SessionEvent;

use crate::state::AppState;

/// GET /api/v1/sessions/{id}/events - Live event stream for one session.
pub async fn session_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!(session_id = %id, "event stream opened");

    let stream = session_stream(state.events.subscribe(), id)
        .filter_map(|event| to_sse_event(&event))
        .map(Ok);

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// Events for `session_id` only. Lagged gaps are logged and skipped.
fn session_stream(
    rx: broadcast::Receiver<SessionEvent>,
    session_id: String,
) -> impl Stream<Item = SessionEvent> {
    BroadcastStream::new(rx).filter_map(move |item| match item {
        Ok(event) if event.session_id() == session_id => Some(event),
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(session_id = %session_id, skipped, "event stream lagged");
            None
        }
    })
}

/// Encode one event with its wire name and JSON payload.
fn to_sse_event(event: &SessionEvent) -> Option<Event> {
    match Event::default().event(event.kind()).json_data(event) {
        Ok(sse) => Some(sse),
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode session event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studyflow_types::session::StepName;

    #[test]
    fn encodes_named_event() {
        let event = SessionEvent::StepFailed {
            session_id: "s1".to_string(),
            step: StepName::Grading,
            error: "model down".to_string(),
        };
        assert!(to_sse_event(&event).is_some());
    }

    #[tokio::test]
    async fn filters_other_sessions() {
        let bus = studyflow_core::event::EventBus::new(16);
        let stream = session_stream(bus.subscribe(), "s1".to_string());
        tokio::pin!(stream);

        bus.publish(SessionEvent::StepStarted {
            session_id: "other".to_string(),
            step: StepName::Planner,
        });
        bus.publish(SessionEvent::StepStarted {
            session_id: "s1".to_string(),
            step: StepName::Retrieval,
        });

        let first = stream.next().await.unwrap();
        assert_eq!(first.session_id(), "s1");
        assert!(matches!(
            first,
            SessionEvent::StepStarted {
                step: StepName::Retrieval,
                ..
            }
        ));
    }
}
