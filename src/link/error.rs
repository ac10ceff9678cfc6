//! Link error types
//!
//! Every variant is recovered by the link itself (reconnect or drop);
//! none reaches query callers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    /// Transport failed while connecting or during the session
    #[error("MQTT connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    /// Request could not be queued on the client
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    /// Broker did not acknowledge the connection in time
    #[error("Timed out connecting to {addr} after {secs}s")]
    ConnectTimeout { addr: String, secs: u64 },

    /// Broker answered but refused the connection
    #[error("Connection refused: {0}")]
    Refused(String),

    /// Session is gone
    #[error("Session closed")]
    Closed,
}

pub type LinkResult<T> = Result<T, LinkError>;
