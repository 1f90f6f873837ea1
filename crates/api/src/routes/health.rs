//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;
use ticket_store::{TicketId, TicketTable};

use super::tickets::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub table: &'static str,
}

/// GET /health: reports whether the ticket table answers reads.
pub async fn check<T: TicketTable + 'static>(
    State(state): State<Arc<AppState<T>>>,
) -> (StatusCode, Json<HealthResponse>) {
    let sentinel = TicketId::new("__health__");
    match state.store.get_optional(&sentinel).await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                table: "reachable",
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "ticket table unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    table: "unreachable",
                }),
            )
        }
    }
}
