//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use studyflow_core::workflow::engine::EngineError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Session engine errors.
    Engine(EngineError),
    /// Request validation error.
    Validation(String),
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        AppError::Engine(e)
    }
}

impl AppError {
    /// HTTP status and machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Engine(EngineError::NotFound(_)) => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND"),
            AppError::Engine(EngineError::InvalidState(_)) => (StatusCode::CONFLICT, "INVALID_STATE"),
            AppError::Engine(EngineError::Validation(_)) | AppError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            AppError::Engine(EngineError::StepFailed { .. }) => (StatusCode::BAD_GATEWAY, "STEP_FAILED"),
            AppError::Engine(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            AppError::Engine(e) => e.to_string(),
            AppError::Validation(msg) => msg.clone(),
        };

        if status.is_server_error() {
            tracing::error!(code, error = %message, "request failed");
        }

        let mut error = json!({
            "code": code,
            "message": message,
        });
        if let AppError::Engine(EngineError::StepFailed { step, .. }) = &self {
            error["details"] = json!({ "step": step });
        }

        let body = json!({
            "data": null,
            "meta": {
                "request_id": "",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [error]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
