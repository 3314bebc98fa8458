//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (store reachable)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;

/// GET /health/live
///
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Returns 200 once the campaign store answers.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    if check_store_health(&state).await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health
///
/// Full health status with component details.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store_ok = check_store_health(&state).await;

    Json(HealthResponse {
        status: if store_ok { "healthy" } else { "unhealthy" }.to_string(),
        store: if store_ok { "ok" } else { "error" }.to_string(),
        backend: state.store.backend().to_string(),
        websocket_connections: state.ws_connection_count().await,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn check_store_health(state: &AppState) -> bool {
    match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(backend = state.store.backend(), error = %e, "Store health check failed");
            false
        }
    }
}
