//! Bounded in-memory event queue.

use std::sync::{Mutex, TryLockError, mpsc};

use statejob_core::Event;
use tracing::trace;

use crate::queue::{EventQueue, QueueError};

/// Capacity of [`BoundedEventQueue::new`].
pub const DEFAULT_CAPACITY: usize = 100;

/// In-memory bounded FIFO.
///
/// - `push` blocks once `capacity` events are waiting
/// - `pop` blocks until an event arrives
/// - `try_pop` never waits; while another consumer is parked in `pop` it reports empty
#[derive(Debug)]
pub struct BoundedEventQueue {
    capacity: usize,
    sender: mpsc::SyncSender<Event>,
    receiver: Mutex<mpsc::Receiver<Event>>,
}

impl BoundedEventQueue {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A zero capacity is bumped to one so `push` can ever succeed without a parked reader.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::sync_channel(capacity);
        Self {
            capacity,
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Enqueue without blocking; a full queue rejects the event.
    pub fn try_push(&self, event: Event) -> Result<(), QueueError> {
        self.sender.try_send(event).map_err(|e| match e {
            mpsc::TrySendError::Full(_) => QueueError::Full,
            mpsc::TrySendError::Disconnected(_) => QueueError::Closed,
        })
    }
}

impl Default for BoundedEventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue for BoundedEventQueue {
    fn push(&self, event: Event) -> Result<(), QueueError> {
        trace!(job_id = %event.job_id(), event_type = %event.event_type(), "push");
        self.sender.send(event).map_err(|_| QueueError::Closed)
    }

    fn pop(&self) -> Result<Event, QueueError> {
        let receiver = self.receiver.lock().map_err(|_| QueueError::Poisoned)?;
        receiver.recv().map_err(|_| QueueError::Closed)
    }

    fn try_pop(&self) -> Option<Event> {
        let receiver = match self.receiver.try_lock() {
            Ok(r) => r,
            Err(TryLockError::WouldBlock) => return None,
            Err(TryLockError::Poisoned(_)) => return None,
        };
        receiver.try_recv().ok()
    }
}
