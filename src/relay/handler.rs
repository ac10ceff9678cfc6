//! Inbound message → table → outbound queue
//!
//! One delivery is decoded, every record is upserted with the publish
//! decision taken under the table lock, and records to republish are
//! serialised and queued after the lock is released. The queue is never
//! awaited: a full queue drops the notification, never the table update.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use super::stats::RelayStats;
use crate::ingest::Decoder;
use crate::link::{Delivery, InboundHandler};
use crate::store::{CongestionRecord, EntityStateTable, PublishPolicy};

pub struct RelayHandler {
    table: Arc<EntityStateTable>,
    decoder: Decoder,
    policy: PublishPolicy,
    outbound: mpsc::Sender<Vec<u8>>,
    stats: Arc<RelayStats>,
}

impl RelayHandler {
    pub fn new(
        table: Arc<EntityStateTable>,
        decoder: Decoder,
        policy: PublishPolicy,
        outbound: mpsc::Sender<Vec<u8>>,
        stats: Arc<RelayStats>,
    ) -> Self {
        Self {
            table,
            decoder,
            policy,
            outbound,
            stats,
        }
    }

    /// Process one raw payload; returns how many records were stored
    pub async fn process(&self, payload: &[u8]) -> usize {
        self.stats.record_message();

        let batch = match self.decoder.decode(payload, Utc::now()) {
            Ok(batch) => batch,
            Err(e) => {
                self.stats.record_decode_error();
                warn!(error = %e, bytes = payload.len(), "Dropping undecodable message");
                return 0;
            }
        };

        if batch.out_of_bounds > 0 {
            self.stats.record_out_of_bounds(batch.out_of_bounds);
        }

        let accepted = batch.records.len();
        for record in batch.records {
            if !record.is_within_bounds() {
                warn!(
                    cell_id = %record.cell_id,
                    congestion_level = record.congestion_level,
                    "Congestion level out of bounds"
                );
            }

            let outcome = self.table.upsert_with_policy(record, self.policy).await;
            self.stats.record_accepted();

            match outcome.publish {
                Some(changed) => self.forward(&changed),
                None => self.stats.record_unchanged(),
            }
        }

        accepted
    }

    fn forward(&self, record: &CongestionRecord) {
        let payload = match serde_json::to_vec(record) {
            Ok(payload) => payload,
            Err(e) => {
                self.stats.record_outbound_dropped();
                warn!(cell_id = %record.cell_id, error = %e, "Failed to serialise record");
                return;
            }
        };

        match self.outbound.try_send(payload) {
            Ok(()) => {
                self.stats.record_published();
                debug!(cell_id = %record.cell_id, level = record.congestion_level, "Queued state change");
            }
            Err(TrySendError::Full(_)) => {
                self.stats.record_outbound_dropped();
                warn!(cell_id = %record.cell_id, "Outbound queue full, dropping state change");
            }
            Err(TrySendError::Closed(_)) => {
                self.stats.record_outbound_dropped();
                debug!(cell_id = %record.cell_id, "Outbound link stopped, dropping state change");
            }
        }
    }
}

#[async_trait]
impl InboundHandler for RelayHandler {
    async fn handle(&self, delivery: Delivery) {
        self.process(&delivery.payload).await;
    }
}
