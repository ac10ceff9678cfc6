//! Relay
//!
//! - **controller**: `RelayController`, lifecycle of both links
//! - **handler**: the per-message decode → upsert → republish step
//! - **stats**: relay counters

pub mod controller;
pub mod handler;
pub mod stats;

pub use controller::{Connectors, RelayController, RelayMonitor};
pub use handler::RelayHandler;
pub use stats::{RelayStats, RelayStatsSnapshot};
