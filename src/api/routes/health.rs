//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (ready to serve traffic)
//! - GET /health - Full health status
//!
//! The relay keeps serving its last snapshot while a broker is unreachable,
//! so none of these depend on link state. `GET /health` reports the links
//! for operators but always answers "healthy".

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::{HealthResponse, LinkStates};
use crate::api::state::AppState;

/// GET /health/live
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// The table exists from boot, so the service is ready as soon as it listens.
pub async fn readiness() -> StatusCode {
    StatusCode::OK
}

/// GET /health
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let summary = state.table.summary().await;

    Json(HealthResponse {
        status: "healthy".to_string(),
        tracked_cells: summary.tracked_cells,
        average_congestion: summary.average_congestion,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        links: LinkStates {
            inbound: state.relay.inbound.state(),
            outbound: state.relay.outbound.state(),
        },
    })
}
