//! Data Transfer Objects
//!
//! Response types for the API endpoints. Records themselves are served as
//! `CongestionRecord`, the same shape that goes out on the downstream topic.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::link::{ConnectionState, LinkMonitor};
use crate::relay::RelayStatsSnapshot;
use crate::store::{CellId, CongestionRecord};

/// GET /
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub endpoints: Vec<String>,
}

/// Connection state of both links
#[derive(Debug, Serialize)]
pub struct LinkStates {
    pub inbound: ConnectionState,
    pub outbound: ConnectionState,
}

/// GET /health
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process answers HTTP
    pub status: String,
    pub tracked_cells: usize,
    pub average_congestion: f64,
    pub uptime_seconds: u64,
    pub version: String,
    /// Informational only; never affects `status`
    pub links: LinkStates,
}

/// GET /api/v1/heatmap
#[derive(Debug, Serialize)]
pub struct HeatmapResponse {
    pub timestamp: DateTime<Utc>,
    pub total_cells: usize,
    pub average_congestion: f64,
    pub most_congested: Option<CellId>,
    pub least_congested: Option<CellId>,
    pub cells: Vec<CongestionRecord>,
}

/// Counters and state of one link
#[derive(Debug, Serialize)]
pub struct LinkStatus {
    pub state: ConnectionState,
    pub connects: u64,
    pub disconnects: u64,
    pub publish_failures: u64,
}

impl From<&LinkMonitor> for LinkStatus {
    fn from(monitor: &LinkMonitor) -> Self {
        let stats = monitor.stats();
        Self {
            state: monitor.state(),
            connects: stats.connects,
            disconnects: stats.disconnects,
            publish_failures: stats.publish_failures,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LinkStatuses {
    pub inbound: LinkStatus,
    pub outbound: LinkStatus,
}

/// GET /api/v1/stats
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub relay: RelayStatsSnapshot,
    pub links: LinkStatuses,
    pub uptime_seconds: u64,
}
