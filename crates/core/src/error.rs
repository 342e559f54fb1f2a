//! Core error model.

use thiserror::Error;

/// Result type used across the data model.
pub type CoreResult<T> = Result<T, CoreError>;

/// Data-model error.
///
/// Covers identifier handling and payload encoding. Storage, queue and dispatch
/// failures belong to the crates that own those concerns.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An identifier string could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A generator node id does not fit the node bit range.
    #[error("invalid generator node {node} (max {max})")]
    InvalidNode { node: u16, max: u16 },

    /// A message could not be turned into payload bytes.
    #[error("payload encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Payload bytes could not be decoded into the requested message type.
    #[error("payload decoding failed: {0}")]
    Decode(#[source] serde_json::Error),
}

impl CoreError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
