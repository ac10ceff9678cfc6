//! Entity state table
//!
//! Maps `CellId` to the latest `CongestionRecord` (last-write-wins, no merge).
//! Thread-safe via Tokio's async RwLock; every read hands out a copy so no
//! caller ever holds a live reference into the map.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::error::{StoreError, StoreResult};
use super::types::{CellId, CongestionRecord};

/// When an accepted update is republished downstream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishPolicy {
    /// Publish only when the cell is new or its congestion level changed
    #[default]
    OnChange,
    /// Publish every accepted update
    Always,
}

impl std::str::FromStr for PublishPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "on_change" | "on-change" | "changed" => Ok(PublishPolicy::OnChange),
            "always" | "every" => Ok(PublishPolicy::Always),
            other => Err(format!(
                "Invalid publish policy: {}. Use on_change or always",
                other
            )),
        }
    }
}

/// Result of one upsert-and-decide step
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    /// Record previously stored for the cell, if any
    pub previous: Option<CongestionRecord>,
    /// Copy of the stored record when it should be republished
    pub publish: Option<CongestionRecord>,
}

/// Aggregate view over the current table contents
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSummary {
    pub tracked_cells: usize,
    pub average_congestion: f64,
    pub most_congested: Option<CellId>,
    pub least_congested: Option<CellId>,
}

impl TableSummary {
    /// Summarise one snapshot. Ties resolve to the smallest cell id.
    pub fn of<'a>(records: impl IntoIterator<Item = &'a CongestionRecord>) -> Self {
        let mut summary = TableSummary {
            tracked_cells: 0,
            average_congestion: 0.0,
            most_congested: None,
            least_congested: None,
        };
        let mut total = 0.0;
        let mut most: Option<&CongestionRecord> = None;
        let mut least: Option<&CongestionRecord> = None;

        for record in records {
            summary.tracked_cells += 1;
            total += record.congestion_level;

            let above = most.map_or(true, |m| {
                record
                    .congestion_level
                    .total_cmp(&m.congestion_level)
                    .then_with(|| m.cell_id.cmp(&record.cell_id))
                    .is_gt()
            });
            if above {
                most = Some(record);
            }

            let below = least.map_or(true, |l| {
                record
                    .congestion_level
                    .total_cmp(&l.congestion_level)
                    .then_with(|| record.cell_id.cmp(&l.cell_id))
                    .is_lt()
            });
            if below {
                least = Some(record);
            }
        }

        if summary.tracked_cells > 0 {
            summary.average_congestion = total / summary.tracked_cells as f64;
        }
        summary.most_congested = most.map(|r| r.cell_id.clone());
        summary.least_congested = least.map(|r| r.cell_id.clone());
        summary
    }
}

/// In-memory latest-state table, created empty and never persisted
#[derive(Debug, Default)]
pub struct EntityStateTable {
    records: RwLock<HashMap<CellId, CongestionRecord>>,
}

impl EntityStateTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or fully replace the record for `record.cell_id`
    ///
    /// Returns the previous record, if any.
    pub async fn upsert(&self, record: CongestionRecord) -> Option<CongestionRecord> {
        self.records
            .write()
            .await
            .insert(record.cell_id.clone(), record)
    }

    /// Upsert and decide republication under a single write lock
    ///
    /// The record to publish is copied out; the lock is released before the
    /// caller touches the network.
    pub async fn upsert_with_policy(
        &self,
        record: CongestionRecord,
        policy: PublishPolicy,
    ) -> UpsertOutcome {
        let mut records = self.records.write().await;

        let should_publish = match (policy, records.get(&record.cell_id)) {
            (PublishPolicy::Always, _) => true,
            (PublishPolicy::OnChange, None) => true,
            (PublishPolicy::OnChange, Some(prev)) => prev.level_differs(&record),
        };

        let publish = should_publish.then(|| record.clone());
        let previous = records.insert(record.cell_id.clone(), record);

        UpsertOutcome { previous, publish }
    }

    /// Get the current record for a cell
    pub async fn get(&self, cell_id: &CellId) -> Option<CongestionRecord> {
        self.records.read().await.get(cell_id).cloned()
    }

    /// Get the current record for a cell, or `StoreError::CellNotFound`
    pub async fn require(&self, cell_id: &CellId) -> StoreResult<CongestionRecord> {
        self.get(cell_id)
            .await
            .ok_or_else(|| StoreError::CellNotFound(cell_id.to_string()))
    }

    /// Point-in-time copy of every record, ordered by cell id
    pub async fn get_all(&self) -> Vec<CongestionRecord> {
        let mut snapshot: Vec<CongestionRecord> =
            self.records.read().await.values().cloned().collect();
        snapshot.sort_by(|a, b| a.cell_id.cmp(&b.cell_id));
        snapshot
    }

    /// Number of tracked cells
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether no cell has been seen yet
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Average, most and least congested cell over the current contents
    pub async fn summary(&self) -> TableSummary {
        let records = self.records.read().await;
        TableSummary::of(records.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn record(id: &str, level: f64) -> CongestionRecord {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        CongestionRecord::new(id, level).timestamp(ts)
    }

    #[tokio::test]
    async fn test_upsert_returns_previous() {
        let table = EntityStateTable::new();

        assert!(table.upsert(record("A", 0.4)).await.is_none());
        let prev = table.upsert(record("A", 0.7)).await.unwrap();
        assert_eq!(prev.congestion_level, 0.4);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let table = EntityStateTable::new();
        table.upsert(record("A", 0.4)).await;
        table.upsert(record("A", 0.7)).await;

        let current = table.get(&CellId::from("A")).await.unwrap();
        assert_eq!(current.congestion_level, 0.7);
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn test_replay_is_idempotent() {
        let table = EntityStateTable::new();
        table.upsert(record("A", 0.55)).await;
        let once = table.get_all().await;

        table.upsert(record("A", 0.55)).await;
        assert_eq!(table.get_all().await, once);
    }

    #[tokio::test]
    async fn test_get_unknown_cell() {
        let table = EntityStateTable::new();
        assert!(table.get(&CellId::from("nonexistent")).await.is_none());

        let err = table.require(&CellId::from("nonexistent")).await.unwrap_err();
        assert_eq!(err, StoreError::CellNotFound("nonexistent".to_string()));
        assert_eq!(err.to_string(), "Cell not found: nonexistent");
    }

    #[tokio::test]
    async fn test_concurrent_upserts_keep_both_cells() {
        let table = Arc::new(EntityStateTable::new());

        let a = {
            let table = Arc::clone(&table);
            tokio::spawn(async move { table.upsert(record("A", 0.1)).await })
        };
        let b = {
            let table = Arc::clone(&table);
            tokio::spawn(async move { table.upsert(record("B", 0.2)).await })
        };
        a.await.unwrap();
        b.await.unwrap();

        let all = table.get_all().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].cell_id.as_str(), "A");
        assert_eq!(all[0].congestion_level, 0.1);
        assert_eq!(all[1].cell_id.as_str(), "B");
        assert_eq!(all[1].congestion_level, 0.2);
    }

    #[tokio::test]
    async fn test_snapshot_is_detached() {
        let table = EntityStateTable::new();
        table.upsert(record("A", 0.1)).await;

        let snapshot = table.get_all().await;
        table.upsert(record("A", 0.9)).await;

        assert_eq!(snapshot[0].congestion_level, 0.1);
    }

    #[tokio::test]
    async fn test_on_change_policy_skips_unchanged_level() {
        let table = EntityStateTable::new();

        let first = table
            .upsert_with_policy(record("A", 0.5), PublishPolicy::OnChange)
            .await;
        assert!(first.previous.is_none());
        assert!(first.publish.is_some());

        let same = table
            .upsert_with_policy(record("A", 0.5), PublishPolicy::OnChange)
            .await;
        assert!(same.previous.is_some());
        assert!(same.publish.is_none());

        let changed = table
            .upsert_with_policy(record("A", 0.6), PublishPolicy::OnChange)
            .await;
        assert_eq!(changed.publish.unwrap().congestion_level, 0.6);
    }

    #[tokio::test]
    async fn test_always_policy_publishes_repeats() {
        let table = EntityStateTable::new();
        table
            .upsert_with_policy(record("A", 0.5), PublishPolicy::Always)
            .await;
        let again = table
            .upsert_with_policy(record("A", 0.5), PublishPolicy::Always)
            .await;
        assert!(again.publish.is_some());
    }

    #[tokio::test]
    async fn test_unchanged_update_still_replaces_record() {
        let table = EntityStateTable::new();
        table
            .upsert_with_policy(record("A", 0.5).people_count(10), PublishPolicy::OnChange)
            .await;
        table
            .upsert_with_policy(record("A", 0.5).people_count(11), PublishPolicy::OnChange)
            .await;

        let current = table.get(&CellId::from("A")).await.unwrap();
        assert_eq!(current.people_count, Some(11));
    }

    #[tokio::test]
    async fn test_summary() {
        let table = EntityStateTable::new();
        assert_eq!(table.summary().await.tracked_cells, 0);

        table.upsert(record("A", 0.2)).await;
        table.upsert(record("B", 0.8)).await;
        table.upsert(record("C", 0.5)).await;

        let summary = table.summary().await;
        assert_eq!(summary.tracked_cells, 3);
        assert!((summary.average_congestion - 0.5).abs() < 1e-9);
        assert_eq!(summary.most_congested, Some(CellId::from("B")));
        assert_eq!(summary.least_congested, Some(CellId::from("A")));
    }

    #[tokio::test]
    async fn test_summary_of_snapshot_matches_snapshot() {
        let table = EntityStateTable::new();
        table.upsert(record("A", 0.4)).await;
        table.upsert(record("B", 0.4)).await;
        let snapshot = table.get_all().await;

        // Written after the snapshot; must not leak into its summary
        table.upsert(record("C", 0.9)).await;

        let summary = TableSummary::of(&snapshot);
        assert_eq!(summary.tracked_cells, snapshot.len());
        assert!((summary.average_congestion - 0.4).abs() < 1e-9);
        assert_eq!(summary.most_congested, Some(CellId::from("A")));
        assert_eq!(summary.least_congested, Some(CellId::from("A")));

        let empty = TableSummary::of(std::iter::empty());
        assert_eq!(empty.tracked_cells, 0);
        assert_eq!(empty.average_congestion, 0.0);
        assert!(empty.most_congested.is_none());
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!("always".parse::<PublishPolicy>(), Ok(PublishPolicy::Always));
        assert_eq!("ON_CHANGE".parse::<PublishPolicy>(), Ok(PublishPolicy::OnChange));
        assert!("sometimes".parse::<PublishPolicy>().is_err());
    }
}
