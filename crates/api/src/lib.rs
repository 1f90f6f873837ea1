//! HTTP adapter for the matchmaking ticket service.
//!
//! Exposes the ticket creation path and lifecycle event intake over the
//! ticket store and reconciler, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use chrono::Duration;
use metrics_exporter_prometheus::PrometheusHandle;
use reconciler::{DEFAULT_TTL_HORIZON_SECS, EventReconciler};
use ticket_store::{TicketStore, TicketTable};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::tickets::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<T: TicketTable + 'static>(
    state: Arc<AppState<T>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<T>))
        .route("/tickets", post(routes::tickets::create::<T>))
        .route("/tickets", get(routes::tickets::list::<T>))
        .route(
            "/tickets/{id}",
            get(routes::tickets::get::<T>)
                .put(routes::tickets::update::<T>)
                .delete(routes::tickets::delete::<T>),
        )
        .route("/events", post(routes::events::ingest::<T>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the ticket store and reconciler over a table.
pub fn create_state<T: TicketTable + 'static>(table: T, config: &Config) -> Arc<AppState<T>> {
    let store = Arc::new(TicketStore::new(table).with_create_retries(config.create_retries));
    let ttl_horizon = Duration::try_seconds(config.ticket_ttl_secs)
        .unwrap_or_else(|| Duration::seconds(DEFAULT_TTL_HORIZON_SECS));
    let reconciler = EventReconciler::new(Arc::clone(&store))
        .with_ttl_horizon(ttl_horizon)
        .with_policy(config.precedence_policy());

    Arc::new(AppState {
        store,
        reconciler,
        create_retries: config.create_retries,
    })
}
