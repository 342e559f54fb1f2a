//! Event queue abstraction (mechanics only).
//!
//! A queue is the FIFO conduit between event producers (callers, handlers,
//! the engine's own terminal notifications) and a consumer loop.
//!
//! ## Contract
//!
//! - **FIFO**: events come out in the order they went in
//! - **No deduplication**: pushing the same event twice delivers it twice
//! - **Shared use**: implementations must be safe to call from several threads at once,
//!   the dispatch engine adds no locking of its own
//! - **Back-pressure is an implementation property**: a bounded queue may block or
//!   reject on `push`; the consumer never relies on either

use std::sync::Arc;

use statejob_core::Event;

/// Queue failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// Non-blocking push found the queue at capacity.
    #[error("queue is full")]
    Full,
    /// Internal lock poisoning.
    #[error("queue lock poisoned")]
    Poisoned,
    /// The other side of the queue is gone.
    #[error("queue closed")]
    Closed,
}

/// FIFO conduit of events.
pub trait EventQueue: Send + Sync {
    /// Enqueue an event.
    fn push(&self, event: Event) -> Result<(), QueueError>;

    /// Dequeue an event, waiting until one is available.
    fn pop(&self) -> Result<Event, QueueError>;

    /// Dequeue an event if one is ready. `None` means empty, not an error.
    fn try_pop(&self) -> Option<Event>;
}

impl<Q> EventQueue for Arc<Q>
where
    Q: EventQueue + ?Sized,
{
    fn push(&self, event: Event) -> Result<(), QueueError> {
        (**self).push(event)
    }

    fn pop(&self) -> Result<Event, QueueError> {
        (**self).pop()
    }

    fn try_pop(&self) -> Option<Event> {
        (**self).try_pop()
    }
}
