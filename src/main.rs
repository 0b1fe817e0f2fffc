use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_records::api::{self, AppState};
use order_records::config::{AppConfig, StoreBackend};
use order_records::domain::order::OrderCommandHandler;
use order_records::metrics::Metrics;
use order_records::store::{InMemoryOrderRepository, OrderRepository, ScyllaOrderRepository};
use order_records::utils::{retry_with_backoff, RetryConfig, SystemClock};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_records=debug")),
        )
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!(
        bind = %config.bind,
        backend = ?config.backend,
        status_policy = config.status_policy.as_str(),
        "Starting order record service"
    );

    // === 1. Storage backend ===
    let repository: Arc<dyn OrderRepository> = match &config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory order store; records are lost on restart");
            Arc::new(InMemoryOrderRepository::new())
        }
        StoreBackend::Scylla { node, keyspace } => {
            let repository = retry_with_backoff(
                "scylla_connect",
                RetryConfig::with_attempts(config.connect_attempts),
                |_attempt| ScyllaOrderRepository::connect(node, keyspace),
            )
            .await
            .into_result()?;
            Arc::new(repository)
        }
    };

    // === 2. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // === 3. Order store ===
    let orders = OrderCommandHandler::new(repository, Arc::new(SystemClock), config.status_policy)
        .with_metrics(metrics.clone());
    let state = web::Data::new(AppState {
        orders: Arc::new(orders),
        metrics,
    });

    // === 4. HTTP server ===
    tracing::info!("🚀 Listening on http://{}", config.bind);
    HttpServer::new(move || App::new().app_data(state.clone()).configure(api::configure))
        .bind(config.bind)?
        .run()
        .await?;

    tracing::info!("Order record service stopped");
    Ok(())
}
