//! Lifecycle event intake.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use reconciler::{FoldOutcome, ReconcileError, parse_notifications};
use ticket_store::TicketTable;

use super::tickets::AppState;
use crate::error::ApiError;

/// POST /events: fold one notification, or a JSON array of them, into the
/// ticket table.
///
/// Responds 202 with per-ticket counts. Tickets that were stale or rejected
/// do not fail the request; an unreachable table does.
#[tracing::instrument(skip(state, body))]
pub async fn ingest<T: TicketTable + 'static>(
    State(state): State<Arc<AppState<T>>>,
    body: String,
) -> Result<(StatusCode, Json<FoldOutcome>), ApiError> {
    let events = parse_notifications(&body).map_err(ReconcileError::from)?;
    let outcome = state.reconciler.process_batch(&events).await?;
    Ok((StatusCode::ACCEPTED, Json(outcome)))
}
