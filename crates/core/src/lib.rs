//! `statejob-core`: job lifecycle data model.
//!
//! This crate contains the **value types** flowing through the dispatcher
//! (no queues, stores or threads).

pub mod error;
pub mod event;
pub mod id;
pub mod job;
pub mod payload;
pub mod state;

pub use error::{CoreError, CoreResult};
pub use event::Event;
pub use id::{JobId, JobIdGenerator};
pub use job::Job;
pub use payload::FailureReport;
pub use state::{EventType, JobKind, JobState};
