//! Relay Controller
//!
//! Starts the inbound and outbound links side by side, wires the inbound
//! handler to the table and the outbound queue, and stops both on shutdown.
//! Neither link has to reach `Connected` before the table is queryable.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::handler::RelayHandler;
use super::stats::{RelayStats, RelayStatsSnapshot};
use crate::config::Config;
use crate::ingest::Decoder;
use crate::link::{Connector, LinkDuty, LinkMonitor, LinkSettings, ManagedLink};
use crate::store::EntityStateTable;

/// Transports for the two links
pub struct Connectors {
    pub upstream: Arc<dyn Connector>,
    pub downstream: Arc<dyn Connector>,
}

impl Connectors {
    /// Same connector for both directions
    pub fn shared(connector: Arc<dyn Connector>) -> Self {
        Self {
            upstream: Arc::clone(&connector),
            downstream: connector,
        }
    }
}

/// Read-only view of a running relay, cheap to clone into HTTP handlers
#[derive(Debug, Clone)]
pub struct RelayMonitor {
    pub inbound: LinkMonitor,
    pub outbound: LinkMonitor,
    stats: Arc<RelayStats>,
}

impl RelayMonitor {
    pub fn stats(&self) -> RelayStatsSnapshot {
        self.stats.snapshot()
    }
}

pub struct RelayController {
    monitor: RelayMonitor,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl RelayController {
    /// Spawn both links; returns immediately
    pub fn start(config: &Config, table: Arc<EntityStateTable>, connectors: Connectors) -> Self {
        let stats = Arc::new(RelayStats::default());
        let (queue_tx, queue_rx) = mpsc::channel(config.relay.outbound_queue_capacity.max(1));

        let handler = RelayHandler::new(
            table,
            Decoder::new(config.relay.strict_bounds),
            config.relay.publish_policy,
            queue_tx,
            Arc::clone(&stats),
        );

        let inbound = ManagedLink::new(
            LinkSettings {
                endpoint: config.upstream.endpoint(&config.relay),
                topic: config.upstream.topic.clone(),
                client_id: unique_client_id(&config.upstream.client_id),
                backoff: config.relay.backoff(),
            },
            connectors.upstream,
            LinkDuty::Subscribe {
                handler: Arc::new(handler),
            },
        );

        let outbound = ManagedLink::new(
            LinkSettings {
                endpoint: config.downstream.endpoint(&config.relay),
                topic: config.downstream.topic.clone(),
                client_id: unique_client_id(&config.downstream.client_id),
                backoff: config.relay.backoff(),
            },
            connectors.downstream,
            LinkDuty::Publish { queue: queue_rx },
        );

        let monitor = RelayMonitor {
            inbound: inbound.monitor(),
            outbound: outbound.monitor(),
            stats,
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        let tasks = vec![
            tokio::spawn(inbound.run(shutdown_rx.clone())),
            tokio::spawn(outbound.run(shutdown_rx)),
        ];

        info!(
            upstream = %config.upstream.endpoint(&config.relay).addr(),
            upstream_topic = %config.upstream.topic,
            downstream = %config.downstream.endpoint(&config.relay).addr(),
            downstream_topic = %config.downstream.topic,
            policy = ?config.relay.publish_policy,
            "Relay started"
        );

        Self {
            monitor,
            shutdown,
            tasks,
        }
    }

    pub fn monitor(&self) -> RelayMonitor {
        self.monitor.clone()
    }

    /// Stop both links and wait for their tasks to finish
    ///
    /// In-flight publishes may be abandoned.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);

        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Link task ended abnormally");
            }
        }

        info!("Relay stopped");
    }
}

/// Brokers drop an older session when a client id is reused
fn unique_client_id(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &suffix[..8])
}
