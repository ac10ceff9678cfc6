//! Stats Routes
//!
//! - GET /api/v1/stats - Relay counters and per-link state

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::dto::{LinkStatus, LinkStatuses, StatsResponse};
use crate::api::state::AppState;

/// GET /api/v1/stats
pub async fn relay_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        relay: state.relay.stats(),
        links: LinkStatuses {
            inbound: LinkStatus::from(&state.relay.inbound),
            outbound: LinkStatus::from(&state.relay.outbound),
        },
        uptime_seconds: state.uptime_seconds(),
    })
}
