//! API error types mapped to HTTP status codes.
//!
//! Each [`ApiError`] variant maps to a specific HTTP status code and produces
//! a JSON response body `{"error": "message"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rankd_core::{Error, ErrorKind};
use serde_json::json;

/// Application-level error type that implements `IntoResponse`.
///
/// Each variant maps to an HTTP status code:
/// - `BadRequest` → 400
/// - `NotFound` → 404
/// - `Conflict` → 409
/// - `Internal` → 500
#[derive(Debug)]
pub enum ApiError {
    /// Invalid request parameters or unknown index (400).
    BadRequest(String),
    /// Route-level resource not found (404).
    NotFound(String),
    /// A build for the same index is already running (409).
    Conflict(String),
    /// Unexpected server error (500).
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        let body = axum::Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err.kind() {
            ErrorKind::ClientError => ApiError::BadRequest(err.to_string()),
            ErrorKind::Conflict => ApiError::Conflict(err.to_string()),
            ErrorKind::BuildFailure => ApiError::Internal(err.to_string()),
            ErrorKind::ConsistencyFault | ErrorKind::Internal => {
                tracing::error!("Query failed: {}", err);
                ApiError::Internal("Internal error".into())
            }
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        tracing::error!("Blocking task failed: {}", err);
        ApiError::Internal("Internal error".into())
    }
}
