//! Managed broker links
//!
//! - **session**: transport traits (`Connector`, `Session`) and endpoint settings
//! - **mqtt**: rumqttc implementation of the transport traits
//! - **managed**: `ManagedLink`, the reconnecting state machine shared by
//!   the inbound and outbound directions
//! - **backoff**: bounded exponential reconnect delay

pub mod backoff;
pub mod error;
pub mod managed;
pub mod mqtt;
pub mod session;

#[cfg(test)]
pub mod testing;

pub use backoff::{Backoff, BackoffPolicy};
pub use error::{LinkError, LinkResult};
pub use managed::{
    ConnectionState, InboundHandler, LinkDuty, LinkMonitor, LinkRole, LinkSettings, LinkStats,
    LinkStatsSnapshot, ManagedLink,
};
pub use mqtt::MqttConnector;
pub use session::{Connector, Credentials, Delivery, Endpoint, Session};
