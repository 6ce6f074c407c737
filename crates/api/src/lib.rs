//! HTTP API server with observability for the order service.
//!
//! Provides REST endpoints for creating, reading and advancing orders, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use domain::OrderService;
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::OrderStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: OrderStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route(
            "/orders/{id}/status",
            patch(routes::orders::update_status::<S>),
        )
        .route(
            "/users/{user_id}/orders",
            get(routes::orders::list_by_user::<S>),
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

/// Registers help text for the metrics exported at `/metrics`.
pub fn describe_metrics() {
    metrics::describe_counter!("orders_created_total", "Orders persisted successfully");
    metrics::describe_counter!(
        "order_status_transitions_total",
        "Order status changes, labelled by source and target status"
    );
    metrics::describe_counter!(
        "order_store_errors_total",
        "Failed store operations, labelled by operation and error kind"
    );
    metrics::describe_histogram!(
        "order_store_query_duration_seconds",
        metrics::Unit::Seconds,
        "Store operation latency"
    );
}

/// Wraps a store in the shared application state.
pub fn create_state<S: OrderStore + 'static>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState {
        order_service: OrderService::new(store),
    })
}
