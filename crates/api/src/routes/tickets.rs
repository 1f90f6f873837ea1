//! Ticket endpoints: the creation path plus direct reads and writes.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use reconciler::EventReconciler;
use ticket_store::{Ticket, TicketDraft, TicketId, TicketStore, TicketTable};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<T: TicketTable> {
    pub store: Arc<TicketStore<T>>,
    pub reconciler: EventReconciler<T>,
    pub create_retries: u32,
}

/// POST /tickets: create a ticket from a partial draft.
#[tracing::instrument(skip(state, body))]
pub async fn create<T: TicketTable + 'static>(
    State(state): State<Arc<AppState<T>>>,
    body: String,
) -> Result<(StatusCode, Json<Ticket>), ApiError> {
    let draft: TicketDraft = serde_json::from_str(&body)
        .map_err(|_| ApiError::BadRequest("Invalid JSON".to_string()))?;
    let ticket = state.store.create(draft, state.create_retries).await?;
    tracing::info!(ticket_id = %ticket.ticket_id, "ticket created");
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// GET /tickets: list every ticket.
#[tracing::instrument(skip(state))]
pub async fn list<T: TicketTable + 'static>(
    State(state): State<Arc<AppState<T>>>,
) -> Result<Json<Vec<Ticket>>, ApiError> {
    Ok(Json(state.store.list().await?))
}

/// GET /tickets/{id}: fetch one ticket.
#[tracing::instrument(skip(state))]
pub async fn get<T: TicketTable + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Path(id): Path<String>,
) -> Result<Json<Ticket>, ApiError> {
    Ok(Json(state.store.get(&TicketId::new(id)).await?))
}

/// PUT /tickets/{id}: replace an existing ticket with a full record.
#[tracing::instrument(skip(state, body))]
pub async fn update<T: TicketTable + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Path(id): Path<String>,
    body: String,
) -> Result<Json<Ticket>, ApiError> {
    let ticket = state.store.parse(&body)?;
    if ticket.ticket_id.as_str() != id {
        return Err(ApiError::BadRequest(format!(
            "ticketId '{}' does not match path id '{id}'",
            ticket.ticket_id
        )));
    }

    Ok(Json(state.store.update(ticket, None).await?))
}

/// DELETE /tickets/{id}: remove an existing ticket.
#[tracing::instrument(skip(state))]
pub async fn delete<T: TicketTable + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.store.delete(&TicketId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
