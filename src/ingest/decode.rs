//! Inbound payload decoding
//!
//! The upstream topic carries two shapes:
//!
//! - a single reading: `{cell_id, congestion_level, timestamp?, people_count?, level?, capacity?}`
//! - a crowd density event: `{event_type: "crowd_density", level?, timestamp?, grid_data: [..]}`
//!
//! Grid cells carry raw head counts; their congestion level is derived from
//! the fixed per-cell capacity.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::error::{DecodeError, DecodeResult};
use crate::store::{CellId, CongestionRecord, MAX_CONGESTION_LEVEL, MIN_CONGESTION_LEVEL};

/// People a single grid cell holds at full congestion
pub const GRID_CELL_CAPACITY: u32 = 50;

/// `event_type` tag of grid-based crowd density events
pub const CROWD_DENSITY_EVENT: &str = "crowd_density";

/// Records decoded from one inbound message
#[derive(Debug, Clone, Default)]
pub struct DecodedBatch {
    /// Records ready to upsert, in payload order
    pub records: Vec<CongestionRecord>,
    /// How many of `records` lie outside the documented level range
    pub out_of_bounds: usize,
}

/// Turns raw upstream payloads into validated records
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder {
    /// Reject out-of-range levels instead of accepting and flagging them
    strict_bounds: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CellIdRepr {
    Text(String),
    Number(i64),
}

impl From<CellIdRepr> for CellId {
    fn from(repr: CellIdRepr) -> Self {
        match repr {
            CellIdRepr::Text(s) => CellId::from(s),
            CellIdRepr::Number(n) => CellId::from(n),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TimestampRepr {
    Millis(i64),
    Text(String),
}

#[derive(Deserialize)]
struct ReadingPayload {
    cell_id: CellIdRepr,
    congestion_level: f64,
    #[serde(default)]
    timestamp: Option<TimestampRepr>,
    #[serde(default)]
    people_count: Option<u32>,
    #[serde(default)]
    level: i32,
    #[serde(default)]
    capacity: Option<u32>,
}

#[derive(Deserialize)]
struct CrowdDensityPayload {
    #[serde(default)]
    level: i32,
    #[serde(default)]
    timestamp: Option<TimestampRepr>,
    #[serde(default)]
    grid_data: Vec<GridCellPayload>,
}

#[derive(Deserialize)]
struct GridCellPayload {
    #[serde(default)]
    cell_id: Option<CellIdRepr>,
    #[serde(default)]
    x: Option<i64>,
    #[serde(default)]
    y: Option<i64>,
    count: u32,
}

impl Decoder {
    /// Create a decoder
    pub fn new(strict_bounds: bool) -> Self {
        Self { strict_bounds }
    }

    /// Decode one payload; `received_at` stamps records without a timestamp
    pub fn decode(&self, payload: &[u8], received_at: DateTime<Utc>) -> DecodeResult<DecodedBatch> {
        let value: Value = serde_json::from_slice(payload).map_err(DecodeError::Json)?;
        if !value.is_object() {
            return Err(DecodeError::NotAnObject);
        }

        let is_grid_event = value
            .get("event_type")
            .and_then(Value::as_str)
            .map(|t| t == CROWD_DENSITY_EVENT)
            .unwrap_or(false);

        let records = if is_grid_event {
            let event: CrowdDensityPayload =
                serde_json::from_value(value).map_err(DecodeError::Schema)?;
            grid_records(event, received_at)?
        } else {
            let reading: ReadingPayload =
                serde_json::from_value(value).map_err(DecodeError::Schema)?;
            vec![reading_record(reading, received_at)?]
        };

        let mut out_of_bounds = 0;
        for record in &records {
            if record.is_within_bounds() {
                continue;
            }
            if self.strict_bounds {
                return Err(DecodeError::OutOfBounds {
                    cell_id: record.cell_id.to_string(),
                    level: record.congestion_level,
                    min: MIN_CONGESTION_LEVEL,
                    max: MAX_CONGESTION_LEVEL,
                });
            }
            out_of_bounds += 1;
        }

        Ok(DecodedBatch {
            records,
            out_of_bounds,
        })
    }
}

/// Build a record from a single reading
fn reading_record(
    reading: ReadingPayload,
    received_at: DateTime<Utc>,
) -> DecodeResult<CongestionRecord> {
    let cell_id = non_empty(reading.cell_id.into())?;

    if !reading.congestion_level.is_finite() {
        return Err(DecodeError::NonFiniteLevel {
            cell_id: cell_id.to_string(),
        });
    }

    let timestamp = match reading.timestamp {
        Some(ts) => parse_timestamp(ts)?,
        None => received_at,
    };

    Ok(CongestionRecord {
        cell_id,
        congestion_level: reading.congestion_level,
        people_count: reading.people_count,
        level: reading.level,
        capacity: reading.capacity,
        timestamp,
    })
}

/// Expand a crowd density event into one record per grid cell
fn grid_records(
    event: CrowdDensityPayload,
    received_at: DateTime<Utc>,
) -> DecodeResult<Vec<CongestionRecord>> {
    let timestamp = match event.timestamp {
        Some(ts) => parse_timestamp(ts)?,
        None => received_at,
    };

    event
        .grid_data
        .into_iter()
        .enumerate()
        .map(|(index, cell)| {
            let cell_id = match (cell.cell_id, cell.x, cell.y) {
                (Some(id), _, _) => non_empty(id.into())?,
                (None, Some(x), Some(y)) => CellId::new(format!("cell_{}_{}_{}", event.level, x, y)),
                _ => return Err(DecodeError::UnaddressableCell { index }),
            };

            Ok(CongestionRecord {
                cell_id,
                congestion_level: occupancy_level(cell.count),
                people_count: Some(cell.count),
                level: event.level,
                capacity: Some(GRID_CELL_CAPACITY),
                timestamp,
            })
        })
        .collect()
}

/// Congestion level for a head count, capped at full capacity
pub fn occupancy_level(count: u32) -> f64 {
    (count as f64 / GRID_CELL_CAPACITY as f64).min(MAX_CONGESTION_LEVEL)
}

fn non_empty(cell_id: CellId) -> DecodeResult<CellId> {
    if cell_id.as_str().trim().is_empty() {
        Err(DecodeError::EmptyCellId)
    } else {
        Ok(cell_id)
    }
}

/// Parse a producer timestamp
///
/// Accepts epoch milliseconds, RFC 3339, or ISO 8601 without offset (taken as UTC).
fn parse_timestamp(repr: TimestampRepr) -> DecodeResult<DateTime<Utc>> {
    match repr {
        TimestampRepr::Millis(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| DecodeError::InvalidTimestamp(ms.to_string())),
        TimestampRepr::Text(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
                return Ok(dt.with_timezone(&Utc));
            }

            for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(&s, format) {
                    return Ok(naive.and_utc());
                }
            }

            Err(DecodeError::InvalidTimestamp(s))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn decode(payload: &str) -> DecodeResult<DecodedBatch> {
        Decoder::default().decode(payload.as_bytes(), now())
    }

    #[test]
    fn test_decode_reading() {
        let batch = decode(
            r#"{"cell_id": "A1", "congestion_level": 0.55, "timestamp": "2024-05-01T10:00:00Z", "people_count": 27, "capacity": 50}"#,
        )
        .unwrap();

        assert_eq!(batch.records.len(), 1);
        let record = &batch.records[0];
        assert_eq!(record.cell_id.as_str(), "A1");
        assert_eq!(record.congestion_level, 0.55);
        assert_eq!(record.people_count, Some(27));
        assert_eq!(record.capacity, Some(50));
        assert_eq!(record.level, 0);
        assert_eq!(
            record.timestamp,
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(batch.out_of_bounds, 0);
    }

    #[test]
    fn test_missing_timestamp_uses_receive_time() {
        let batch = decode(r#"{"cell_id": "A1", "congestion_level": 0.4}"#).unwrap();
        assert_eq!(batch.records[0].timestamp, now());
    }

    #[test]
    fn test_integer_cell_id() {
        let batch = decode(r#"{"cell_id": 17, "congestion_level": 0.4}"#).unwrap();
        assert_eq!(batch.records[0].cell_id.as_str(), "17");
    }

    #[test]
    fn test_naive_and_millis_timestamps() {
        let batch = decode(
            r#"{"cell_id": "A1", "congestion_level": 0.4, "timestamp": "2024-05-01T10:00:00.250000"}"#,
        )
        .unwrap();
        assert_eq!(
            batch.records[0].timestamp.timestamp_millis(),
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap().timestamp_millis() + 250
        );

        let batch =
            decode(r#"{"cell_id": "A1", "congestion_level": 0.4, "timestamp": 1714557600000}"#)
                .unwrap();
        assert_eq!(batch.records[0].timestamp.timestamp_millis(), 1714557600000);
    }

    #[test]
    fn test_missing_cell_id_rejected() {
        let err = decode(r#"{"congestion_level": 0.5}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Schema(_)));
    }

    #[test]
    fn test_non_numeric_level_rejected() {
        let err = decode(r#"{"cell_id": "test", "congestion_level": "invalid"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Schema(_)));
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(matches!(decode("invalid json"), Err(DecodeError::Json(_))));
        assert!(matches!(decode("[1, 2]"), Err(DecodeError::NotAnObject)));
    }

    #[test]
    fn test_empty_cell_id_rejected() {
        let err = decode(r#"{"cell_id": "  ", "congestion_level": 0.5}"#).unwrap_err();
        assert!(matches!(err, DecodeError::EmptyCellId));
    }

    #[test]
    fn test_bad_timestamp_rejected() {
        let err = decode(r#"{"cell_id": "A", "congestion_level": 0.5, "timestamp": "yesterday"}"#)
            .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidTimestamp(_)));
    }

    #[test]
    fn test_out_of_bounds_flagged_by_default() {
        let batch = decode(r#"{"cell_id": "A1", "congestion_level": 1.5}"#).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.out_of_bounds, 1);
    }

    #[test]
    fn test_out_of_bounds_rejected_when_strict() {
        let err = Decoder::new(true)
            .decode(br#"{"cell_id": "A1", "congestion_level": 1.5}"#, now())
            .unwrap_err();
        assert!(matches!(err, DecodeError::OutOfBounds { .. }));
    }

    #[test]
    fn test_crowd_density_event() {
        let batch = decode(
            r#"{
                "event_type": "crowd_density",
                "level": 0,
                "timestamp": "2024-05-01T10:00:00",
                "grid_data": [
                    {"cell_id": "cell_A1", "count": 15},
                    {"cell_id": "cell_A2", "count": 35},
                    {"x": 2, "y": 3, "count": 25}
                ]
            }"#,
        )
        .unwrap();

        let ids: Vec<&str> = batch.records.iter().map(|r| r.cell_id.as_str()).collect();
        assert_eq!(ids, vec!["cell_A1", "cell_A2", "cell_0_2_3"]);

        assert_eq!(batch.records[0].congestion_level, 0.3);
        assert_eq!(batch.records[1].congestion_level, 0.7);
        assert_eq!(batch.records[2].congestion_level, 0.5);
        assert_eq!(batch.records[2].people_count, Some(25));
        assert!(batch
            .records
            .iter()
            .all(|r| r.capacity == Some(GRID_CELL_CAPACITY)));
    }

    #[test]
    fn test_grid_cell_id_uses_floor_level() {
        let batch = decode(
            r#"{"event_type": "crowd_density", "level": 2, "grid_data": [{"x": 5, "y": 10, "count": 10}]}"#,
        )
        .unwrap();
        assert_eq!(batch.records[0].cell_id.as_str(), "cell_2_5_10");
        assert_eq!(batch.records[0].level, 2);
        assert_eq!(batch.records[0].timestamp, now());
    }

    #[test]
    fn test_grid_count_capped_at_capacity() {
        assert_eq!(occupancy_level(60), 1.0);
        assert_eq!(occupancy_level(0), 0.0);
        assert_eq!(occupancy_level(25), 0.5);
    }

    #[test]
    fn test_empty_grid_yields_nothing() {
        let batch = decode(r#"{"event_type": "crowd_density", "grid_data": []}"#).unwrap();
        assert!(batch.records.is_empty());
    }

    #[test]
    fn test_unaddressable_grid_cell_rejected() {
        let err = decode(
            r#"{"event_type": "crowd_density", "grid_data": [{"cell_id": "ok", "count": 1}, {"x": 1, "count": 2}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::UnaddressableCell { index: 1 }));
    }
}
