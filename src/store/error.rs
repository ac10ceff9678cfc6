//! State table error types

use thiserror::Error;

/// Errors surfaced by table lookups
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record has ever been stored for this cell
    #[error("Cell not found: {0}")]
    CellNotFound(String),
}

/// Result type alias for table lookups
pub type StoreResult<T> = Result<T, StoreError>;
