use statejob_core::{CoreError, EventType, JobId, JobState};
use statejob_events::QueueError;

use crate::jobs::JobStoreError;

/// Failure while building the engine or handling one event.
///
/// `handle_event` returns the first failure it meets and stops there, so the
/// variant also tells how far processing got.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The engine was built without an input queue.
    #[error("input queue is required")]
    MissingInputQueue,
    /// The event targets a job absent from the store.
    #[error("unknown job: {0}")]
    UnknownJob(JobId),
    /// No routing entry exists for the job's current state.
    #[error("unknown state: {0}")]
    UnknownState(JobState),
    /// The state is routed but the event type is not registered under it.
    #[error("unknown event type {event_type} in state {state}")]
    UnknownEventType {
        state: JobState,
        event_type: EventType,
    },
    /// Job store failure other than a missing event target.
    #[error("job store: {0}")]
    Store(#[from] JobStoreError),
    /// Queue failure while pushing an event.
    #[error("event queue: {0}")]
    Queue(#[from] QueueError),
    /// A notification payload could not be encoded.
    #[error("payload: {0}")]
    Payload(#[from] CoreError),
    /// The background loop thread could not be started.
    #[error("failed to spawn dispatch loop: {0}")]
    Spawn(#[source] std::io::Error),
    /// Error returned by a handler, passed through untouched.
    #[error(transparent)]
    Handler(anyhow::Error),
}

impl DispatchError {
    /// True for the three routing failures (unknown job, state or event type).
    pub fn is_routing(&self) -> bool {
        matches!(
            self,
            Self::UnknownJob(_) | Self::UnknownState(_) | Self::UnknownEventType { .. }
        )
    }
}
