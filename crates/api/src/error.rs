//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use reconciler::ReconcileError;
use ticket_store::TicketStoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// The request conflicts with stored state.
    Conflict(String),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<TicketStoreError> for ApiError {
    fn from(err: TicketStoreError) -> Self {
        match &err {
            TicketStoreError::NotFound(_) => ApiError::NotFound(err.to_string()),
            TicketStoreError::BadRequest(msg) => ApiError::BadRequest(msg.clone()),
            TicketStoreError::Collision { .. } => ApiError::Conflict(err.to_string()),
            TicketStoreError::Table(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Store(store_err) => store_err.into(),
            ReconcileError::Payload(e) => ApiError::BadRequest(format!("Invalid event payload: {e}")),
        }
    }
}
