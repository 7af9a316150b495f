//! HTTP API for the partitioned order service.
//!
//! Exposes order create/update/cancel/read endpoints over the orchestrator,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::{InMemoryOrderStore, OrderStore, PartitionRouter, PostgresOrderStore, StoreError};
use orchestrator::services::http_client;
use orchestrator::{
    EventPublisher, HttpInventoryService, HttpPricingService, IdempotencyError, IdempotencyGuard,
    InMemoryEventPublisher, InMemoryIdempotencyGuard, KafkaEventPublisher, OrderOrchestrator,
    PublishError, RedisIdempotencyGuard,
};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::orders::AppState;

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("order store: {0}")]
    Store(#[from] StoreError),

    #[error("idempotency cache: {0}")]
    Idempotency(#[from] IdempotencyError),

    #[error("event publisher: {0}")]
    Publisher(#[from] PublishError),

    #[error("collaborator HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: AppState, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::system::health))
        .route(
            "/orders",
            post(routes::orders::create).put(routes::orders::update),
        )
        .route(
            "/orders/{id}",
            get(routes::orders::get).delete(routes::orders::cancel),
        )
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

/// Wires the orchestrator to the backends selected by `config`.
///
/// Postgres, Redis and Kafka are used when configured; otherwise orders,
/// idempotency tokens and events are kept in memory.
pub async fn build_state(config: &Config) -> Result<AppState, StartupError> {
    let store: Arc<dyn OrderStore> = if config.database_urls.is_empty() {
        let router = PartitionRouter::new(config.partition_count)?;
        tracing::warn!(
            partitions = router.partition_count(),
            "DATABASE_URLS not set, keeping orders in memory"
        );
        Arc::new(InMemoryOrderStore::new(router))
    } else {
        let store =
            PostgresOrderStore::connect(&config.database_urls, config.database_max_connections)
                .await?;
        store.run_migrations().await?;
        Arc::new(store)
    };

    let guard: Arc<dyn IdempotencyGuard> = match &config.redis_url {
        Some(url) => Arc::new(RedisIdempotencyGuard::connect(url, config.idempotency_ttl).await?),
        None => {
            tracing::warn!("REDIS_URL not set, keeping idempotency tokens in memory");
            Arc::new(InMemoryIdempotencyGuard::new(config.idempotency_ttl))
        }
    };

    let publisher: Arc<dyn EventPublisher> = match &config.kafka_brokers {
        Some(brokers) => Arc::new(KafkaEventPublisher::new(brokers, config.kafka_topic.as_str())?),
        None => {
            tracing::warn!("KAFKA_BROKERS not set, keeping change events in memory");
            Arc::new(InMemoryEventPublisher::new())
        }
    };

    let client = http_client(config.collaborator_timeout)?;
    let inventory = HttpInventoryService::new(client.clone(), config.inventory_service_url.as_str());
    let pricing = HttpPricingService::new(client, config.pricing_service_url.as_str());

    let orchestrator = OrderOrchestrator::new(
        store,
        guard,
        Arc::new(inventory),
        Arc::new(pricing),
        publisher,
        config.orchestrator(),
    );

    Ok(AppState { orchestrator })
}
