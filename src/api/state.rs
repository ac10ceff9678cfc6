//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use crate::relay::RelayMonitor;
use crate::store::EntityStateTable;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Latest congestion state per cell
    pub table: Arc<EntityStateTable>,
    /// Link states and relay counters
    pub relay: RelayMonitor,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(table: Arc<EntityStateTable>, relay: RelayMonitor) -> Self {
        Self {
            table,
            relay,
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
