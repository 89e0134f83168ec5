//! HTTP control surface for the reconciler
//!
//! Read-only status plus admin triggers. Every trigger funnels through
//! the same engine methods the cycle uses, so a forced sweep or drain is
//! indistinguishable from a scheduled one.

pub mod handlers;
pub mod sse;

use crate::engine::Engine;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub engine: Arc<Engine>,
}

/// Build the control-surface router
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health check (no prefix for health endpoint)
        .route("/health", get(handlers::health))
        // API v1 routes
        .nest(
            "/api/v1",
            Router::new()
                .route("/status", get(handlers::status))
                .route("/scheduler/history", get(handlers::scheduler_history))
                .route("/sweep", post(handlers::trigger_sweep))
                .route("/queue/drain", post(handlers::trigger_drain))
                .route("/pause", post(handlers::pause))
                .route("/resume", post(handlers::resume))
                .route("/events", get(sse::event_stream)),
        )
        .with_state(ctx)
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}
