//! Study session HTTP handlers.
//!
//! Endpoints:
//! - POST   /api/v1/sessions               - Start a session
//! - GET    /api/v1/sessions               - List sessions
//! - GET    /api/v1/sessions/{id}          - Latest state of a session
//! - DELETE /api/v1/sessions/{id}          - Delete a session
//! - POST   /api/v1/sessions/{id}/answers  - Submit answers
//! - GET    /api/v1/sessions/{id}/history  - Checkpoint history
//! - POST   /api/v1/sessions/{id}/recover  - Re-run a failed step

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use studyflow_core::service::session::{
    HistoryResponse, StartResponse, StatusResponse, SubmitResponse,
};
use studyflow_types::checkpoint::SessionSummary;
use studyflow_types::session::AnswerMap;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Request body for starting a session.
#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    #[serde(alias = "question")]
    pub user_question: String,
    /// Caller-chosen id; generated when absent.
    #[serde(default, alias = "thread_id")]
    pub session_id: Option<String>,
}

/// Request body for submitting answers, keyed by question id.
#[derive(Debug, Deserialize)]
pub struct SubmitAnswersRequest {
    pub answers: AnswerMap,
}

/// Query parameters for session listing.
#[derive(Debug, Deserialize)]
pub struct SessionListQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

fn session_links<T: serde::Serialize>(resp: ApiResponse<T>, id: &str) -> ApiResponse<T> {
    resp.with_link("self", &format!("/api/v1/sessions/{id}"))
        .with_link("history", &format!("/api/v1/sessions/{id}/history"))
        .with_link("events", &format!("/api/v1/sessions/{id}/events"))
}

/// POST /api/v1/sessions - Start a session and run it to the first quiz.
pub async fn start_session(
    State(state): State<AppState>,
    Json(body): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<StartResponse>>), AppError> {
    let start = Instant::now();

    if body.user_question.trim().is_empty() {
        return Err(AppError::Validation("user_question must not be empty".to_string()));
    }

    let response = state
        .sessions
        .start(body.session_id, &body.user_question)
        .await?;

    let id = response.session_id.clone();
    let resp = session_links(ApiResponse::success(response, start), &id)
        .with_link("answers", &format!("/api/v1/sessions/{id}/answers"));

    Ok((StatusCode::CREATED, Json(resp)))
}

/// GET /api/v1/sessions - List sessions, most recently updated first.
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<SessionListQuery>,
) -> Result<Json<ApiResponse<Vec<SessionSummary>>>, AppError> {
    let start = Instant::now();

    let sessions = state.sessions.list_sessions(query.limit).await?;

    Ok(Json(
        ApiResponse::success(sessions, start).with_link("self", "/api/v1/sessions"),
    ))
}

/// GET /api/v1/sessions/{id} - Latest state of a session.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<StatusResponse>>, AppError> {
    let start = Instant::now();

    let status = state.sessions.get_status(&id).await?;

    Ok(Json(session_links(ApiResponse::success(status, start), &id)))
}

/// POST /api/v1/sessions/{id}/answers - Grade answers and return feedback.
pub async fn submit_answers(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SubmitAnswersRequest>,
) -> Result<Json<ApiResponse<SubmitResponse>>, AppError> {
    let start = Instant::now();

    let response = state.sessions.submit_answers(&id, body.answers).await?;

    Ok(Json(session_links(ApiResponse::success(response, start), &id)))
}

/// GET /api/v1/sessions/{id}/history - Checkpoint history, oldest first.
pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<HistoryResponse>>, AppError> {
    let start = Instant::now();

    let history = state.sessions.get_history(&id).await?;

    Ok(Json(session_links(ApiResponse::success(history, start), &id)))
}

/// POST /api/v1/sessions/{id}/recover - Re-run the failed step.
pub async fn recover_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<StatusResponse>>, AppError> {
    let start = Instant::now();

    let status = state.sessions.recover(&id).await?;

    Ok(Json(session_links(ApiResponse::success(status, start), &id)))
}

/// DELETE /api/v1/sessions/{id} - Purge every checkpoint of a session.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let start = Instant::now();

    state.sessions.delete(&id).await?;

    Ok(Json(ApiResponse::success(
        serde_json::json!({"deleted": true, "session_id": id}),
        start,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_request_accepts_aliases() {
        let body: StartSessionRequest =
            serde_json::from_str(r#"{"question": "What is a closure?", "thread_id": "study_x"}"#)
                .unwrap();
        assert_eq!(body.user_question, "What is a closure?");
        assert_eq!(body.session_id.as_deref(), Some("study_x"));

        let body: StartSessionRequest =
            serde_json::from_str(r#"{"user_question": "Traits"}"#).unwrap();
        assert!(body.session_id.is_none());
    }

    #[test]
    fn answers_request_parses_map() {
        let body: SubmitAnswersRequest =
            serde_json::from_str(r#"{"answers": {"q1": "A", "q2": "borrow"}}"#).unwrap();
        assert_eq!(body.answers.len(), 2);
        assert_eq!(body.answers["q2"], "borrow");
    }
}
