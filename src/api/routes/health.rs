//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET / - Welcome message
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (not shutting down)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::{HealthResponse, RootResponse};
use crate::api::state::AppState;

/// GET /
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Monitor de Agua en tiempo real".to_string(),
    })
}

/// GET /health/live
///
/// Kubernetes liveness probe.
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Returns 503 once shutdown has begun so load balancers stop routing here.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.shutdown.is_cancelled() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

/// GET /health
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let snapshot = state.telemetry.snapshot();
    Json(HealthResponse {
        status: "healthy".to_string(),
        mode: snapshot.mode,
        reading: snapshot.reading,
        viewers: state.viewers.count(),
        publishers: state.publishers.count(),
        pubsub_connections: state.pubsub_connection_count().await,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
