//! Relay counters
//!
//! Plain atomics; every counter only grows for the life of the process.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct RelayStats {
    messages_received: AtomicU64,
    records_accepted: AtomicU64,
    decode_errors: AtomicU64,
    out_of_bounds: AtomicU64,
    published: AtomicU64,
    unchanged_skipped: AtomicU64,
    outbound_dropped: AtomicU64,
}

/// Point-in-time copy of `RelayStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelayStatsSnapshot {
    /// Inbound messages seen, decodable or not
    pub messages_received: u64,
    /// Records written to the table
    pub records_accepted: u64,
    /// Messages dropped because they failed to decode
    pub decode_errors: u64,
    /// Accepted records whose level lies outside [0.0, 1.0]
    pub out_of_bounds: u64,
    /// Records handed to the outbound link
    pub published: u64,
    /// Records not republished because the level did not change
    pub unchanged_skipped: u64,
    /// Records not republished because the outbound queue was full or closed
    pub outbound_dropped: u64,
}

impl RelayStats {
    pub fn record_message(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accepted(&self) {
        self.records_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_out_of_bounds(&self, count: usize) {
        self.out_of_bounds.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unchanged(&self) {
        self.unchanged_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outbound_dropped(&self) {
        self.outbound_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            records_accepted: self.records_accepted.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            out_of_bounds: self.out_of_bounds.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            unchanged_skipped: self.unchanged_skipped.load(Ordering::Relaxed),
            outbound_dropped: self.outbound_dropped.load(Ordering::Relaxed),
        }
    }
}
