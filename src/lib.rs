//! # Congestion Relay
//!
//! Stadium congestion relay: subscribes to raw congestion events on an
//! upstream MQTT broker, keeps the latest state of every cell in memory,
//! republishes state changes to a downstream broker and serves the
//! current snapshot over HTTP.
//!
//! ```text
//! upstream broker ──► inbound link ──► decode ──► EntityStateTable ──► outbound link ──► downstream broker
//!                                                       │
//!                                                       └──► HTTP query API
//! ```
//!
//! ## Modules
//!
//! - [`store`]: per-cell latest-state table
//! - [`ingest`]: inbound payload decoding and validation
//! - [`link`]: reconnecting broker links over MQTT
//! - [`relay`]: wiring and lifecycle of both links
//! - [`api`]: REST API server with Axum
//! - [`config`]: TOML + environment configuration

pub mod api;
pub mod config;
pub mod ingest;
pub mod link;
pub mod relay;
pub mod store;

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{ApiConfig, Config, ConfigError, LogFormat, LoggingConfig, RelayConfig};

pub use ingest::{DecodeError, Decoder};

pub use link::{ConnectionState, LinkError, LinkRole, MqttConnector};

pub use relay::{Connectors, RelayController, RelayMonitor, RelayStatsSnapshot};

pub use store::{CellId, CongestionRecord, EntityStateTable, PublishPolicy, StoreError};
