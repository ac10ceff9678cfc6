//! Congestion State Store
//!
//! In-memory, per-cell latest-state table:
//!
//! - **types**: `CellId`, `CongestionRecord`, level bounds
//! - **error**: `StoreError` for lookups of unknown cells
//! - **table**: `EntityStateTable` and the republication policy
//!
//! # Concurrency
//!
//! ```text
//! Write path (inbound link only):
//!   record → write lock → insert + publish decision → copy out → unlock
//!
//! Read path (query surface, relay):
//!   read lock → clone → unlock
//! ```
//!
//! Nothing is persisted; the table lives for the process lifetime.

pub mod error;
pub mod table;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use table::{EntityStateTable, PublishPolicy, TableSummary, UpsertOutcome};
pub use types::{CellId, CongestionRecord, MAX_CONGESTION_LEVEL, MIN_CONGESTION_LEVEL};
