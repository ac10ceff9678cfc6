//! Managed pub/sub link
//!
//! One type serves both directions; the `LinkDuty` decides whether the link
//! subscribes and feeds an `InboundHandler`, or drains an outbound queue.
//!
//! ```text
//! Disconnected → Connecting → Connected ─(error)→ Reconnecting → Connecting → …
//!                                      └─(shutdown)→ Disconnected
//! ```

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::backoff::{Backoff, BackoffPolicy};
use super::error::LinkError;
use super::session::{Connector, Delivery, Endpoint, Session};

/// Direction of a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkRole {
    Inbound,
    Outbound,
}

impl fmt::Display for LinkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkRole::Inbound => f.write_str("inbound"),
            LinkRole::Outbound => f.write_str("outbound"),
        }
    }
}

/// Connection state of one link, owned by the link task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Receives every delivery of an inbound link
#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn handle(&self, delivery: Delivery);
}

/// What a link does while connected
pub enum LinkDuty {
    /// Subscribe to the topic and pass each delivery to the handler
    Subscribe { handler: Arc<dyn InboundHandler> },
    /// Publish every queued payload to the topic
    Publish { queue: mpsc::Receiver<Vec<u8>> },
}

impl LinkDuty {
    fn role(&self) -> LinkRole {
        match self {
            LinkDuty::Subscribe { .. } => LinkRole::Inbound,
            LinkDuty::Publish { .. } => LinkRole::Outbound,
        }
    }
}

/// Static settings of one link
#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub endpoint: Endpoint,
    pub topic: String,
    pub client_id: String,
    pub backoff: BackoffPolicy,
}

/// Per-link counters
#[derive(Debug, Default)]
pub struct LinkStats {
    connects: AtomicU64,
    disconnects: AtomicU64,
    publish_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LinkStatsSnapshot {
    pub connects: u64,
    pub disconnects: u64,
    pub publish_failures: u64,
}

impl LinkStats {
    pub fn snapshot(&self) -> LinkStatsSnapshot {
        LinkStatsSnapshot {
            connects: self.connects.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
        }
    }
}

/// Read-only view of a running link
#[derive(Debug, Clone)]
pub struct LinkMonitor {
    role: LinkRole,
    state: watch::Receiver<ConnectionState>,
    stats: Arc<LinkStats>,
}

impl LinkMonitor {
    pub fn role(&self) -> LinkRole {
        self.role
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn stats(&self) -> LinkStatsSnapshot {
        self.stats.snapshot()
    }
}

enum SessionEnd {
    Shutdown,
    Lost(LinkError),
}

/// A broker connection that keeps itself alive until shut down
pub struct ManagedLink {
    role: LinkRole,
    settings: LinkSettings,
    connector: Arc<dyn Connector>,
    duty: LinkDuty,
    state: watch::Sender<ConnectionState>,
    stats: Arc<LinkStats>,
}

impl ManagedLink {
    pub fn new(settings: LinkSettings, connector: Arc<dyn Connector>, duty: LinkDuty) -> Self {
        Self {
            role: duty.role(),
            settings,
            connector,
            duty,
            state: watch::channel(ConnectionState::Disconnected).0,
            stats: Arc::new(LinkStats::default()),
        }
    }

    pub fn monitor(&self) -> LinkMonitor {
        LinkMonitor {
            role: self.role,
            state: self.state.subscribe(),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Connect, serve and reconnect until `shutdown` turns true
    ///
    /// Connection failures never end the loop; only shutdown does.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = Backoff::new(self.settings.backoff);
        let addr = self.settings.endpoint.addr();

        loop {
            self.set_state(ConnectionState::Connecting);

            let opened = tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                opened = open_session(self.connector.as_ref(), &self.settings, self.role) => opened,
            };

            match opened {
                Ok(mut session) => {
                    self.stats.connects.fetch_add(1, Ordering::Relaxed);
                    backoff.reset();
                    self.set_state(ConnectionState::Connected);
                    info!(role = %self.role, broker = %addr, topic = %self.settings.topic, "Link connected");

                    match self.serve(session.as_mut(), &mut shutdown).await {
                        SessionEnd::Shutdown => {
                            session.close().await;
                            break;
                        }
                        SessionEnd::Lost(e) => {
                            self.stats.disconnects.fetch_add(1, Ordering::Relaxed);
                            warn!(role = %self.role, broker = %addr, error = %e, "Link lost");
                        }
                    }
                }
                Err(e) => {
                    warn!(role = %self.role, broker = %addr, error = %e, "Connection attempt failed");
                }
            }

            self.set_state(ConnectionState::Reconnecting);
            let delay = backoff.next_delay();
            info!(
                role = %self.role,
                broker = %addr,
                attempt = backoff.attempts(),
                delay_ms = delay.as_millis() as u64,
                "Reconnecting"
            );

            if self.wait_out(delay, &mut shutdown).await {
                break;
            }
        }

        self.set_state(ConnectionState::Disconnected);
        info!(role = %self.role, broker = %addr, "Link stopped");
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    async fn serve(
        &mut self,
        session: &mut dyn Session,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        loop {
            match &mut self.duty {
                LinkDuty::Subscribe { handler } => {
                    let polled = tokio::select! {
                        _ = shutdown_requested(shutdown) => return SessionEnd::Shutdown,
                        polled = session.poll() => polled,
                    };
                    match polled {
                        Ok(delivery) => handler.handle(delivery).await,
                        Err(e) => return SessionEnd::Lost(e),
                    }
                }
                LinkDuty::Publish { queue } => {
                    let next = tokio::select! {
                        _ = shutdown_requested(shutdown) => return SessionEnd::Shutdown,
                        polled = session.poll() => match polled {
                            Ok(_) => continue,
                            Err(e) => return SessionEnd::Lost(e),
                        },
                        next = queue.recv() => next,
                    };
                    let Some(payload) = next else {
                        return SessionEnd::Shutdown;
                    };
                    if let Err(e) = session.publish(&self.settings.topic, payload).await {
                        self.stats.publish_failures.fetch_add(1, Ordering::Relaxed);
                        warn!(role = %self.role, topic = %self.settings.topic, error = %e, "Publish failed");
                    }
                }
            }
        }
    }

    /// Sleep out a backoff delay; returns true when shutdown was requested
    ///
    /// An outbound link discards what is queued meanwhile so stale states
    /// are not replayed after reconnect.
    async fn wait_out(&mut self, delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            match &mut self.duty {
                LinkDuty::Subscribe { .. } => {
                    return tokio::select! {
                        _ = shutdown_requested(shutdown) => true,
                        _ = &mut sleep => false,
                    };
                }
                LinkDuty::Publish { queue } => {
                    let next = tokio::select! {
                        _ = shutdown_requested(shutdown) => return true,
                        _ = &mut sleep => return false,
                        next = queue.recv() => next,
                    };
                    if next.is_none() {
                        return true;
                    }
                    self.stats.publish_failures.fetch_add(1, Ordering::Relaxed);
                    debug!(role = %self.role, "Dropped publish while disconnected");
                }
            }
        }
    }
}

/// Connect and, for inbound links, (re)establish the subscription
async fn open_session(
    connector: &dyn Connector,
    settings: &LinkSettings,
    role: LinkRole,
) -> Result<Box<dyn Session>, LinkError> {
    let mut session = connector
        .connect(&settings.endpoint, &settings.client_id)
        .await?;

    if role == LinkRole::Inbound {
        session.subscribe(&settings.topic).await?;
    }

    Ok(session)
}

/// Resolves once shutdown is requested or its sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
