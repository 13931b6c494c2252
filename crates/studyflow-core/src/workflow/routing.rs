//! Post-feedback routing decision.

use studyflow_types::session::{MAX_RETRIES, PASS_THRESHOLD, SessionState};

/// Where execution goes after the feedback step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Generate a new quiz and suspend again.
    Retry,
    End,
}

/// Whether feedback should request another quiz cycle.
pub fn should_retry(score: u8, retry_count: u32) -> bool {
    score < PASS_THRESHOLD && retry_count < MAX_RETRIES
}

/// Pure routing function, evaluated once per feedback completion.
///
/// The retry counter is incremented by the engine only after this returns
/// `Retry`, so the guard sees the number of retries already taken.
pub fn should_continue(state: &SessionState) -> Route {
    if state.should_retry && state.retry_count < MAX_RETRIES {
        Route::Retry
    } else {
        Route::End
    }
}
