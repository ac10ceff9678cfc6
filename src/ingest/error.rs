//! Decode error types
//!
//! Every variant means "drop this one message"; none of them is fatal to the
//! inbound link.

use thiserror::Error;

/// Errors raised while turning an inbound payload into records
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Payload is not valid JSON
    #[error("Invalid JSON: {0}")]
    Json(#[source] serde_json::Error),

    /// Payload is JSON but not an object
    #[error("Payload must be a JSON object")]
    NotAnObject,

    /// Missing required field or wrong field type
    #[error("Invalid payload: {0}")]
    Schema(#[source] serde_json::Error),

    /// `cell_id` present but empty
    #[error("cell_id must not be empty")]
    EmptyCellId,

    /// Grid cell has neither `cell_id` nor an `x`/`y` position
    #[error("Grid cell {index} has no cell_id and no x/y position")]
    UnaddressableCell { index: usize },

    /// `congestion_level` is NaN or infinite
    #[error("congestion_level for {cell_id} is not a finite number")]
    NonFiniteLevel { cell_id: String },

    /// `congestion_level` outside the documented range under strict bounds
    #[error("congestion_level {level} for {cell_id} is outside [{min}, {max}]")]
    OutOfBounds {
        cell_id: String,
        level: f64,
        min: f64,
        max: f64,
    },

    /// Timestamp could not be interpreted
    #[error("Cannot parse timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Result type alias for decode operations
pub type DecodeResult<T> = Result<T, DecodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DecodeError::EmptyCellId;
        assert_eq!(err.to_string(), "cell_id must not be empty");

        let err = DecodeError::OutOfBounds {
            cell_id: "A1".to_string(),
            level: 1.5,
            min: 0.0,
            max: 1.0,
        };
        assert_eq!(
            err.to_string(),
            "congestion_level 1.5 for A1 is outside [0, 1]"
        );
    }
}
