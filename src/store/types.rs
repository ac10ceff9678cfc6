//! Core data types for the congestion state table
//!
//! - `CellId`: identifier of one physical zone
//! - `CongestionRecord`: latest known measurement for a cell
//! - `MIN_CONGESTION_LEVEL` / `MAX_CONGESTION_LEVEL`: documented level range

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest documented congestion level (empty)
pub const MIN_CONGESTION_LEVEL: f64 = 0.0;

/// Highest documented congestion level (full capacity)
pub const MAX_CONGESTION_LEVEL: f64 = 1.0;

/// Identifier of a physical cell/zone
///
/// Upstream producers send either strings or integers; both are kept in
/// their decimal string form so `7` and `"7"` address the same cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(String);

impl CellId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CellId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CellId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for CellId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

/// Latest known congestion state of one cell
///
/// This is both the table value and the downstream wire payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CongestionRecord {
    /// Cell identifier, unique per physical zone
    pub cell_id: CellId,
    /// Congestion level, documented range 0.0 (empty) to 1.0 (full)
    pub congestion_level: f64,
    /// Number of people counted in the cell, when the producer reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub people_count: Option<u32>,
    /// Floor level of the cell
    #[serde(default)]
    pub level: i32,
    /// Maximum capacity of the cell, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    /// Measurement time (producer supplied, or receive time as fallback)
    pub timestamp: DateTime<Utc>,
}

impl CongestionRecord {
    /// Create a record stamped with the current time
    pub fn new(cell_id: impl Into<CellId>, congestion_level: f64) -> Self {
        Self {
            cell_id: cell_id.into(),
            congestion_level,
            people_count: None,
            level: 0,
            capacity: None,
            timestamp: Utc::now(),
        }
    }

    /// Builder method: set timestamp
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Builder method: set people count
    pub fn people_count(mut self, count: u32) -> Self {
        self.people_count = Some(count);
        self
    }

    /// Builder method: set floor level
    pub fn level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    /// Builder method: set capacity
    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Whether the congestion level lies inside the documented range
    pub fn is_within_bounds(&self) -> bool {
        (MIN_CONGESTION_LEVEL..=MAX_CONGESTION_LEVEL).contains(&self.congestion_level)
    }

    /// Whether `other` carries a different congestion level than `self`
    pub fn level_differs(&self, other: &CongestionRecord) -> bool {
        self.congestion_level != other.congestion_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cell_id_from_integer() {
        assert_eq!(CellId::from(42), CellId::from("42"));
        assert_eq!(CellId::from(42).as_str(), "42");
    }

    #[test]
    fn test_record_builder() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let record = CongestionRecord::new("A1", 0.55)
            .timestamp(ts)
            .people_count(27)
            .level(2)
            .capacity(50);

        assert_eq!(record.cell_id.as_str(), "A1");
        assert_eq!(record.people_count, Some(27));
        assert_eq!(record.level, 2);
        assert_eq!(record.capacity, Some(50));
        assert_eq!(record.timestamp, ts);
    }

    #[test]
    fn test_bounds() {
        assert!(CongestionRecord::new("a", 0.0).is_within_bounds());
        assert!(CongestionRecord::new("a", 1.0).is_within_bounds());
        assert!(!CongestionRecord::new("a", 1.5).is_within_bounds());
        assert!(!CongestionRecord::new("a", -0.1).is_within_bounds());
    }

    #[test]
    fn test_wire_shape() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let record = CongestionRecord::new("A1", 0.5).timestamp(ts);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["cell_id"], "A1");
        assert_eq!(json["congestion_level"], 0.5);
        assert_eq!(json["level"], 0);
        assert_eq!(json["timestamp"], "2024-05-01T12:00:00Z");
        assert!(json.get("people_count").is_none());
    }
}
