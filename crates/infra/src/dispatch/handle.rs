//! Capability handed to handlers.

use statejob_core::{Event, Job, JobId};

use super::DispatchError;

/// What a handler may do with the engine that invoked it.
///
/// Handlers can read and persist jobs, emit events and close jobs out. Routing
/// and loop internals are not reachable from here.
pub trait EngineHandle: Send + Sync {
    /// Current snapshot of a job.
    fn get_job(&self, job_id: JobId) -> Result<Job, DispatchError>;

    /// Persist a modified job (full replace), e.g. after advancing its state.
    fn update_job(&self, job: &Job) -> Result<(), DispatchError>;

    /// Push an event onto the engine's input queue.
    fn push_event(&self, event: Event) -> Result<(), DispatchError>;

    /// Push an event onto the output queue. `Ok(false)` when there is none.
    fn emit(&self, event: Event) -> Result<bool, DispatchError>;

    /// Mark a job `COMPLETED` and notify the output queue.
    fn job_completed(&self, job: Job) -> Result<(), DispatchError>;

    /// Mark a job `FAILED` and notify the output queue with the cause's message.
    fn job_failed(&self, job: Job, cause: &dyn core::fmt::Display) -> Result<(), DispatchError>;
}
