//! Job-lifecycle dispatch: routes events to handlers by (job state, event type).
//!
//! ## Flow
//!
//! ```text
//! Event
//!   ↓
//! 1. Look up the target job in the store            (UnknownJob)
//!   ↓
//! 2. Resolve the handler from (job.state, type)     (UnknownState / UnknownEventType)
//!   ↓
//! 3. Invoke handler(job, payload, engine, ctx)      (handler error, verbatim)
//! ```
//!
//! Handlers drive the job forward themselves: persist a new state through
//! [`EngineHandle::update_job`], push follow-up events, or close the job with
//! [`EngineHandle::job_completed`] / [`EngineHandle::job_failed`], which also
//! notify the output queue when one is configured.
//!
//! Nothing here retries. The background loop logs a failed event and moves on.

pub mod cancel;
pub mod context;
pub mod engine;
pub mod error;
pub mod handle;
pub mod routing;

pub use cancel::CancellationToken;
pub use context::HandlerContext;
pub use engine::{DispatchEngine, DispatchEngineBuilder, DispatchStats};
pub use error::DispatchError;
pub use handle::EngineHandle;
pub use routing::{EventHandler, RoutingTable};
