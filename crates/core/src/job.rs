//! Job record: the unit of work whose lifecycle the dispatch engine drives.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::id::JobId;
use crate::payload;
use crate::state::{JobKind, JobState};

/// A job and its current lifecycle position.
///
/// `id` and `kind` never change after creation. `state` is only meant to move
/// through the engine's update path (store replace or the terminal helpers).
/// `payload` is replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub state: JobState,
    #[serde(default)]
    pub payload: Vec<u8>,
    pub started_at: DateTime<Utc>,
    /// Unset until a terminal state is reached.
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a pending job with no payload.
    pub fn new(kind: JobKind) -> Self {
        Self {
            id: JobId::new(),
            kind,
            state: JobState::PENDING,
            payload: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Create a pending job carrying an encoded message.
    pub fn with_message<M>(kind: JobKind, message: &M) -> CoreResult<Self>
    where
        M: Serialize + ?Sized,
    {
        let payload = payload::encode(message)?;
        Ok(Self {
            payload,
            ..Self::new(kind)
        })
    }

    /// Decode the payload into a message.
    pub fn decode_payload<M: DeserializeOwned>(&self) -> CoreResult<M> {
        payload::decode(&self.payload)
    }

    pub fn has_payload(&self) -> bool {
        !self.payload.is_empty()
    }

    /// Move to `state`, keeping the current payload.
    pub fn advance(&mut self, state: JobState) {
        self.state = state;
    }

    /// Move to `state` and replace the payload.
    ///
    /// The job is left untouched if the message cannot be encoded.
    pub fn advance_with<M>(&mut self, state: JobState, message: &M) -> CoreResult<()>
    where
        M: Serialize + ?Sized,
    {
        self.payload = payload::encode(message)?;
        self.state = state;
        Ok(())
    }

    /// Enter a terminal state and stamp the end time.
    pub fn finish(&mut self, state: JobState) {
        self.state = state;
        self.ended_at = Some(Utc::now());
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
