//! skuflow-api — HTTP surface for the product update pipeline.
//!
//! Accepts product events, stamps them with a sequence number, and hands
//! them to the worker manager. Reads go straight to the product store.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/events` | Accept a product update (202) |
//! | GET | `/products/{id}` | Current merged product state (the id may contain `/`) |
//! | GET | `/healthz` | Liveness |
//! | GET | `/debug/metrics` | Pipeline counters as JSON |
//! | GET | `/metrics` | Prometheus exposition |
//! | GET | `/openapi.yaml` | OpenAPI document |
//! | GET | `/docs` | Swagger UI |
//!
//! Every response carries an `X-Request-Id` header.

pub mod handlers;
pub mod metrics;
pub mod middleware;

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::{get, post};
use skuflow_autoscale::WorkerManager;
use skuflow_queue::Sequencer;
use skuflow_state::ProductStore;

pub use middleware::{REQUEST_ID_HEADER, RequestId};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub manager: WorkerManager,
    pub sequencer: Arc<Sequencer>,
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(manager: WorkerManager) -> Self {
        Self {
            manager,
            sequencer: Arc::new(Sequencer::new()),
            started_at: Instant::now(),
        }
    }

    pub fn store(&self) -> &ProductStore {
        self.manager.store()
    }
}

/// Build the complete router with request-id and access-log middleware.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/events", post(handlers::post_event))
        .route("/products/{*id}", get(handlers::get_product))
        .route("/healthz", get(handlers::healthz))
        .route("/debug/metrics", get(handlers::debug_metrics))
        .route("/metrics", get(handlers::prometheus_metrics))
        .route("/openapi.yaml", get(handlers::openapi_document))
        .route("/docs", get(handlers::docs_page))
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .fallback(handlers::not_found)
        .layer(axum::middleware::from_fn(middleware::request_context))
        .with_state(state)
}
