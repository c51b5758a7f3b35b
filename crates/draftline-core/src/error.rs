//! Error types for the draft model.

use thiserror::Error;

use crate::status::SaveStatus;

/// Errors raised by the draft model itself.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DraftError {
    /// Storage keys must be non-empty and free of control characters.
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    /// The caller's value could not be turned into a snapshot.
    #[error("snapshot serialization failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The snapshot does not fit the requested shape.
    #[error("snapshot does not match the expected shape: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("invalid save status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: SaveStatus, to: SaveStatus },
}
