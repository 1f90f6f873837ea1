//! API server entry point.

use std::time::Duration;

use api::config::Config;
use metrics_exporter_prometheus::PrometheusHandle;
use ticket_store::{InMemoryTicketTable, PostgresTicketTable, TicketTable};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Purges expired tickets on a fixed interval. PostgreSQL has no native
/// row expiry, so the sweep stands in for it.
async fn run_sweep_loop(table: PostgresTicketTable, interval: Duration) {
    let mut timer = tokio::time::interval(interval);
    loop {
        timer.tick().await;
        match table.sweep_expired(chrono::Utc::now().timestamp()).await {
            Ok(removed) if removed > 0 => {
                metrics::counter!("tickets_expired").increment(removed);
                tracing::info!(removed, "expired tickets swept");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "ticket sweep failed"),
        }
    }
}

async fn serve<T: TicketTable + 'static>(table: T, config: &Config, metrics_handle: PrometheusHandle) {
    let state = api::create_state(table, config);
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick the ticket table and serve
    match config.database_url.clone() {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .expect("failed to connect to database");
            let table = PostgresTicketTable::new(pool);
            table.run_migrations().await.expect("migrations failed");
            tracing::info!("using PostgreSQL ticket table");
            tokio::spawn(run_sweep_loop(
                table.clone(),
                Duration::from_secs(config.sweep_interval_secs),
            ));
            serve(table, &config, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory ticket table");
            serve(InMemoryTicketTable::new(), &config, metrics_handle).await;
        }
    }
}
