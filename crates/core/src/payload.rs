//! Opaque payload codec.
//!
//! Payloads travel as bytes; only handlers know their schema. Messages are
//! encoded with `serde_json`. An empty byte string means "no message".

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::{CoreError, CoreResult};

/// Encode a message into payload bytes.
pub fn encode<T: Serialize + ?Sized>(message: &T) -> CoreResult<Vec<u8>> {
    serde_json::to_vec(message).map_err(CoreError::Encode)
}

/// Decode payload bytes into a message.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CoreResult<T> {
    serde_json::from_slice(bytes).map_err(CoreError::Decode)
}

/// Payload of a `FAILED` event: why the job failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    pub message: String,
}

impl FailureReport {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
