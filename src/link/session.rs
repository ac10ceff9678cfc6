//! Transport seam for managed links
//!
//! A `Connector` opens `Session`s against a broker endpoint. The managed link
//! only talks to these traits, so the MQTT transport and the in-process test
//! broker are interchangeable.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use super::error::LinkResult;

/// Username/password pair for brokers that require authentication
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Where and how to reach a broker
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
    /// `None` connects anonymously
    pub credentials: Option<Credentials>,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            keep_alive: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            credentials: None,
        }
    }

    /// `host:port` form used in logs
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// One message received on a subscribed topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Opens broker sessions
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect and wait for the broker's acknowledgement
    async fn connect(&self, endpoint: &Endpoint, client_id: &str) -> LinkResult<Box<dyn Session>>;
}

/// A live broker connection
///
/// `poll` must be driven continuously while the session is open; it yields
/// deliveries for subscribed topics and fails once the connection is lost.
#[async_trait]
pub trait Session: Send {
    async fn subscribe(&mut self, topic: &str) -> LinkResult<()>;

    /// Hand a payload to the transport without waiting for the broker
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> LinkResult<()>;

    /// Next delivery, or the error that ended the session
    async fn poll(&mut self) -> LinkResult<Delivery>;

    /// Best-effort graceful disconnect
    async fn close(&mut self);
}
