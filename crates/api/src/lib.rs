//! HTTP API server for the marketplace checkout.
//!
//! Provides REST endpoints for checkout, transaction history and catalog
//! reads, with structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route(
            "/transactions",
            get(routes::transactions::list::<S>).post(routes::transactions::create::<S>),
        )
        .route("/transactions/{id}", get(routes::transactions::get::<S>))
        .route("/products", get(routes::products::list::<S>))
        .route("/products/{id}", get(routes::products::get::<S>))
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

/// Creates the default application state over a store.
pub fn create_default_state<S: Store + Clone + 'static>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState::new(store))
}
