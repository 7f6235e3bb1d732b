//! Error types for territory-sync.

use thiserror::Error;

use crate::transport::TransportError;

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised on the replication path.
///
/// None of these reach the mutation path: the scheduler logs them and
/// retries the affected subscriber on a later tick.
#[derive(Debug, Error)]
pub enum Error {
    /// Delivering a frame to a subscriber failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A payload could not be serialized or parsed.
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// An encoded payload does not fit the frame's length prefix.
    #[error("payload of {0} bytes exceeds the frame limit")]
    FrameTooLarge(usize),

    /// A frame was truncated or carried an unknown tag.
    #[error("malformed frame: {0}")]
    Decode(String),
}
