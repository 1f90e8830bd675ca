use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Liveness response payload.
#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    /// Jobs waiting for the simulation thread.
    pub queue_depth: usize,
}

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub queue_depth: usize,
    /// Published results not yet collected by a waiter.
    pub pending_results: usize,
}

/// GET / -- liveness probe.
async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    Json(ReadyResponse {
        status: "ready",
        queue_depth: state.queue.depth(),
    })
}

/// GET /health -- service status with queue and result-table sizes.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        queue_depth: state.queue.depth(),
        pending_results: state.results.len(),
    })
}

/// Mount health check routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(ready))
        .route("/health", get(health_check))
}
