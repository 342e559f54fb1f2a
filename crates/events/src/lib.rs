//! Event queues: the conduit between event producers and the dispatch loop.

pub mod in_memory_queue;
pub mod queue;

pub use in_memory_queue::{BoundedEventQueue, DEFAULT_CAPACITY};
pub use queue::{EventQueue, QueueError};
