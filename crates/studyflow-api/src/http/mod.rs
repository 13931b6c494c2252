//! HTTP/REST API layer for StudyFlow.
//!
//! Axum-based REST API at `/api/v1/` with an envelope response format, CORS
//! support and an SSE feed of session events.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
