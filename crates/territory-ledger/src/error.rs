//! Error types for territory-ledger.

use thiserror::Error;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while mutating or addressing the ledger.
///
/// Every variant is raised before any state is touched, so a failed call
/// leaves the ledger exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The owner id was empty or whitespace.
    #[error("invalid owner id: {0:?}")]
    InvalidOwner(String),

    /// The cell has an empty or whitespace region.
    #[error("invalid cell: region must not be blank")]
    InvalidCell,

    /// A `region:x:z` key could not be parsed.
    #[error("invalid cell key: {0:?}")]
    InvalidCellKey(String),
}
