//! Events addressed to jobs.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::id::JobId;
use crate::payload::{self, FailureReport};
use crate::state::EventType;

/// A message addressed to a job.
///
/// Events are values: no identity beyond their fields and no deduplication.
/// Delivering the same event twice invokes its handler twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    job_id: JobId,
    event_type: EventType,
    #[serde(default)]
    payload: Vec<u8>,
}

impl Event {
    /// Event without payload.
    pub fn new(job_id: JobId, event_type: impl Into<EventType>) -> Self {
        Self::from_parts(job_id, event_type, Vec::new())
    }

    /// Event carrying an encoded message.
    pub fn with_message<M>(
        job_id: JobId,
        event_type: impl Into<EventType>,
        message: &M,
    ) -> CoreResult<Self>
    where
        M: Serialize + ?Sized,
    {
        Ok(Self::from_parts(job_id, event_type, payload::encode(message)?))
    }

    /// Event carrying already-encoded payload bytes.
    pub fn from_parts(job_id: JobId, event_type: impl Into<EventType>, payload: Vec<u8>) -> Self {
        Self {
            job_id,
            event_type: event_type.into(),
            payload,
        }
    }

    /// Notification that `job_id` completed.
    pub fn completed(job_id: JobId) -> Self {
        Self::new(job_id, EventType::COMPLETED)
    }

    /// Notification that `job_id` failed, carrying the cause's message.
    pub fn failed(job_id: JobId, cause: &dyn core::fmt::Display) -> CoreResult<Self> {
        Self::with_message(
            job_id,
            EventType::FAILED,
            &FailureReport::new(cause.to_string()),
        )
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub fn decode_payload<M: DeserializeOwned>(&self) -> CoreResult<M> {
        payload::decode(&self.payload)
    }

    /// Message of a `FAILED` notification, if this is one.
    pub fn failure_message(&self) -> Option<String> {
        if self.event_type != EventType::FAILED {
            return None;
        }
        self.decode_payload::<FailureReport>()
            .ok()
            .map(|r| r.message)
    }
}
