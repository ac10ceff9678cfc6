//! Inbound message decoding
//!
//! Turns raw upstream payloads into `CongestionRecord`s. A payload that
//! fails to decode is dropped with a `DecodeError`; the table is untouched.

pub mod decode;
pub mod error;

pub use decode::{occupancy_level, DecodedBatch, Decoder, CROWD_DENSITY_EVENT, GRID_CELL_CAPACITY};
pub use error::{DecodeError, DecodeResult};
