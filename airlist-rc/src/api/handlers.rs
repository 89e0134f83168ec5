//! HTTP request handlers for the control surface

use crate::api::AppContext;
use crate::engine::EngineStatus;
use crate::error::Error;
use crate::scheduler::Transition;
use airlist_common::events::ServiceState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    state: ServiceState,
}

#[derive(Debug, Serialize)]
pub struct StatusLine {
    status: String,
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    status: String,
    state: ServiceState,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    transitions: Vec<Transition>,
}

/// Map engine errors to a response without leaking internals
fn error_response(err: Error) -> (StatusCode, Json<StatusLine>) {
    let status = match err {
        Error::InvalidState(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(StatusLine {
            status: format!("error: {}", err),
        }),
    )
}

// ============================================================================
// Endpoints
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "airlist-rc".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        state: ctx.engine.state().await,
    })
}

/// GET /api/v1/status - Current engine status
pub async fn status(State(ctx): State<AppContext>) -> Json<EngineStatus> {
    Json(ctx.engine.status().await)
}

/// GET /api/v1/scheduler/history - Bounded transition log
pub async fn scheduler_history(State(ctx): State<AppContext>) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        transitions: ctx.engine.scheduler_history().await,
    })
}

/// POST /api/v1/sweep - Run a duplicate sweep now
pub async fn trigger_sweep(State(ctx): State<AppContext>) -> Json<StatusLine> {
    ctx.engine.run_sweep_now().await;
    ctx.engine.persist().await;
    Json(StatusLine {
        status: "sweep completed".to_string(),
    })
}

/// POST /api/v1/queue/drain - Retry one queued lookup now
pub async fn trigger_drain(State(ctx): State<AppContext>) -> Json<StatusLine> {
    ctx.engine.drain_retry_once().await;
    ctx.engine.persist().await;
    Json(StatusLine {
        status: "drain completed".to_string(),
    })
}

/// POST /api/v1/pause - Suspend ticking
pub async fn pause(
    State(ctx): State<AppContext>,
) -> Result<Json<StateResponse>, (StatusCode, Json<StatusLine>)> {
    match ctx.engine.pause().await {
        Ok(state) => Ok(Json(StateResponse {
            status: "paused".to_string(),
            state,
        })),
        Err(err) => Err(error_response(err)),
    }
}

/// POST /api/v1/resume - Resume ticking
pub async fn resume(
    State(ctx): State<AppContext>,
) -> Result<Json<StateResponse>, (StatusCode, Json<StatusLine>)> {
    match ctx.engine.resume().await {
        Ok(state) => Ok(Json(StateResponse {
            status: "resumed".to_string(),
            state,
        })),
        Err(err) => Err(error_response(err)),
    }
}
