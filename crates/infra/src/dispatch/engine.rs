//! Dispatch engine: event consumption loop and single-event handling.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use statejob_core::{Event, Job, JobId, JobState};
use statejob_events::EventQueue;

use super::{CancellationToken, DispatchError, EngineHandle, HandlerContext, RoutingTable};
use crate::config::DispatchConfig;
use crate::jobs::{InMemoryJobStore, JobStore, JobStoreError};

/// Event counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Events whose handler returned success
    pub handled: u64,
    /// Events that failed routing, lookup or in their handler
    pub failed: u64,
}

/// Builder for [`DispatchEngine`].
#[derive(Default)]
pub struct DispatchEngineBuilder {
    input: Option<Arc<dyn EventQueue>>,
    output: Option<Arc<dyn EventQueue>>,
    jobs: Option<Arc<dyn JobStore>>,
    routes: RoutingTable,
    config: DispatchConfig,
    bounded_input: bool,
    bounded_output: bool,
}

impl DispatchEngineBuilder {
    /// Queue the loop consumes from. Required.
    pub fn input(mut self, queue: Arc<dyn EventQueue>) -> Self {
        self.input = Some(queue);
        self
    }

    /// Without an explicit input queue, build one sized by `config.queue_capacity`.
    pub fn bounded_input(mut self) -> Self {
        self.bounded_input = true;
        self
    }

    /// Queue receiving completion/failure notifications. Optional.
    pub fn output(mut self, queue: Arc<dyn EventQueue>) -> Self {
        self.output = Some(queue);
        self
    }

    /// Without an explicit output queue, build one sized by `config.queue_capacity`.
    pub fn bounded_output(mut self) -> Self {
        self.bounded_output = true;
        self
    }

    /// Job store. Defaults to an empty [`InMemoryJobStore`].
    pub fn jobs(mut self, store: Arc<dyn JobStore>) -> Self {
        self.jobs = Some(store);
        self
    }

    /// Routing table. Defaults to an empty table (every event fails to route).
    pub fn routes(mut self, routes: RoutingTable) -> Self {
        self.routes = routes;
        self
    }

    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<DispatchEngine, DispatchError> {
        let bounded = |enabled: bool| -> Option<Arc<dyn EventQueue>> {
            enabled.then(|| Arc::new(self.config.queue()) as Arc<dyn EventQueue>)
        };
        let input = self
            .input
            .or_else(|| bounded(self.bounded_input))
            .ok_or(DispatchError::MissingInputQueue)?;
        let output = self.output.or_else(|| bounded(self.bounded_output));
        let jobs: Arc<dyn JobStore> = match self.jobs {
            Some(jobs) => jobs,
            None => InMemoryJobStore::arc(),
        };

        Ok(DispatchEngine {
            core: Arc::new(EngineCore {
                name: self.config.name,
                idle_backoff: self.config.idle_backoff,
                input,
                output,
                jobs,
                routes: self.routes,
                handled: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
            current: Mutex::new(None),
        })
    }
}

/// Routes events to handlers chosen by the target job's current state.
///
/// ```text
/// input queue ─▶ job store lookup ─▶ routing table (state, type) ─▶ handler
///                                                                    │
///                       job store / queues / terminal helpers ◀──────┘
/// ```
///
/// `handle_event` processes one event synchronously. `run` starts a background
/// loop draining the input queue until its cancellation token fires; events are
/// handled one at a time in queue order. At most one loop runs per engine: a
/// new `run` stops the previous loop.
///
/// Dropping the engine cancels its most recent loop.
pub struct DispatchEngine {
    core: Arc<EngineCore>,
    current: Mutex<Option<LoopHandle>>,
}

struct LoopHandle {
    cancel: CancellationToken,
    join: Option<thread::JoinHandle<()>>,
}

impl DispatchEngine {
    pub fn builder() -> DispatchEngineBuilder {
        DispatchEngineBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn input(&self) -> &Arc<dyn EventQueue> {
        &self.core.input
    }

    pub fn output(&self) -> Option<&Arc<dyn EventQueue>> {
        self.core.output.as_ref()
    }

    pub fn jobs(&self) -> &Arc<dyn JobStore> {
        &self.core.jobs
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.core.routes
    }

    pub fn stats(&self) -> DispatchStats {
        self.core.stats()
    }

    /// Handle one event with an empty context.
    pub fn handle_event(&self, event: &Event) -> Result<(), DispatchError> {
        self.core.handle_event(event, &HandlerContext::default())
    }

    /// Handle one event, passing `ctx` to the handler.
    pub fn handle_event_with(
        &self,
        event: &Event,
        ctx: &HandlerContext,
    ) -> Result<(), DispatchError> {
        self.core.handle_event(event, ctx)
    }

    /// Start the background loop on its own thread.
    ///
    /// The loop stops once `cancel` (or [`DispatchEngine::shutdown`]) fires; it
    /// checks between events, so an in-flight handler always finishes. A loop
    /// left over from an earlier `run` is stopped and joined first.
    pub fn run(
        &self,
        cancel: &CancellationToken,
        ctx: HandlerContext,
    ) -> Result<(), DispatchError> {
        let previous = self.current().take();
        if let Some(mut previous) = previous {
            previous.cancel.cancel();
            if let Some(join) = previous.join.take() {
                if !join.is_finished() {
                    warn!(
                        engine = %self.core.name,
                        "dispatch loop restarted while running; stopping the previous loop"
                    );
                }
                if join.join().is_err() {
                    error!(engine = %self.core.name, "dispatch loop thread panicked");
                }
            }
        }

        let token = cancel.child_token();
        let core = self.core.clone();
        let loop_token = token.clone();

        let join = thread::Builder::new()
            .name(self.core.name.clone())
            .spawn(move || dispatch_loop(&core, &loop_token, &ctx))
            .map_err(DispatchError::Spawn)?;

        *self.current() = Some(LoopHandle {
            cancel: token,
            join: Some(join),
        });
        Ok(())
    }

    /// Signal the most recent loop to stop. Does not wait for it.
    ///
    /// Must follow a `run`; without one it only logs.
    pub fn shutdown(&self) {
        match self.current().as_ref() {
            Some(handle) => {
                debug!(engine = %self.core.name, "dispatch loop shutdown requested");
                handle.cancel.cancel();
            }
            None => debug!(engine = %self.core.name, "shutdown without a running loop"),
        }
    }

    /// Block until the most recent loop has exited.
    pub fn wait(&self) {
        let join = self.current().as_mut().and_then(|h| h.join.take());
        if let Some(join) = join {
            if join.join().is_err() {
                error!(engine = %self.core.name, "dispatch loop thread panicked");
            }
        }
    }

    /// Shutdown followed by [`DispatchEngine::wait`].
    pub fn shutdown_and_wait(&self) {
        self.shutdown();
        self.wait();
    }

    /// True while the most recent loop thread is alive.
    pub fn is_running(&self) -> bool {
        self.current()
            .as_ref()
            .and_then(|h| h.join.as_ref())
            .is_some_and(|j| !j.is_finished())
    }

    fn current(&self) -> MutexGuard<'_, Option<LoopHandle>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for DispatchEngine {
    fn drop(&mut self) {
        if let Some(handle) = self.current().as_ref() {
            handle.cancel.cancel();
        }
    }
}

impl core::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("name", &self.core.name)
            .field("has_output", &self.core.output.is_some())
            .field("routes", &self.core.routes)
            .field("stats", &self.core.stats())
            .finish()
    }
}

impl EngineHandle for DispatchEngine {
    fn get_job(&self, job_id: JobId) -> Result<Job, DispatchError> {
        self.core.get_job(job_id)
    }

    fn update_job(&self, job: &Job) -> Result<(), DispatchError> {
        self.core.update_job(job)
    }

    fn push_event(&self, event: Event) -> Result<(), DispatchError> {
        self.core.push_event(event)
    }

    fn emit(&self, event: Event) -> Result<bool, DispatchError> {
        self.core.emit(event)
    }

    fn job_completed(&self, job: Job) -> Result<(), DispatchError> {
        self.core.job_completed(job)
    }

    fn job_failed(&self, job: Job, cause: &dyn core::fmt::Display) -> Result<(), DispatchError> {
        self.core.job_failed(job, cause)
    }
}

/// State shared between the engine and its loop thread.
struct EngineCore {
    name: String,
    idle_backoff: Duration,
    input: Arc<dyn EventQueue>,
    output: Option<Arc<dyn EventQueue>>,
    jobs: Arc<dyn JobStore>,
    routes: RoutingTable,
    handled: AtomicU64,
    failed: AtomicU64,
}

impl EngineCore {
    fn handle_event(&self, event: &Event, ctx: &HandlerContext) -> Result<(), DispatchError> {
        let result = self.dispatch(event, ctx);
        let counter = if result.is_ok() { &self.handled } else { &self.failed };
        counter.fetch_add(1, Ordering::Relaxed);
        result
    }

    fn dispatch(&self, event: &Event, ctx: &HandlerContext) -> Result<(), DispatchError> {
        let job = self.get_job(event.job_id())?;
        let handler = self.routes.resolve(job.state, event.event_type())?;

        debug!(
            engine = %self.name,
            job_id = %job.id,
            state = %job.state,
            event_type = %event.event_type(),
            "dispatching event"
        );

        handler
            .handle(job, event.payload(), self, ctx)
            .map_err(DispatchError::Handler)
    }

    fn stats(&self) -> DispatchStats {
        DispatchStats {
            handled: self.handled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn idle(&self) {
        if self.idle_backoff.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(self.idle_backoff);
        }
    }

    /// Shared shape of the two terminal helpers.
    fn finish(
        &self,
        mut job: Job,
        state: JobState,
        notice: impl FnOnce(JobId) -> Result<Event, DispatchError>,
    ) -> Result<(), DispatchError> {
        job.finish(state);
        self.jobs.replace(&job)?;
        info!(engine = %self.name, job_id = %job.id, state = %state, "job finished");

        if let Some(output) = &self.output {
            output.push(notice(job.id)?)?;
        }
        Ok(())
    }
}

impl EngineHandle for EngineCore {
    fn get_job(&self, job_id: JobId) -> Result<Job, DispatchError> {
        self.jobs.get(job_id).map_err(|e| match e {
            JobStoreError::NotFound(id) => DispatchError::UnknownJob(id),
            other => DispatchError::Store(other),
        })
    }

    fn update_job(&self, job: &Job) -> Result<(), DispatchError> {
        Ok(self.jobs.replace(job)?)
    }

    fn push_event(&self, event: Event) -> Result<(), DispatchError> {
        Ok(self.input.push(event)?)
    }

    fn emit(&self, event: Event) -> Result<bool, DispatchError> {
        match &self.output {
            Some(output) => {
                output.push(event)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn job_completed(&self, job: Job) -> Result<(), DispatchError> {
        self.finish(job, JobState::COMPLETED, |id| Ok(Event::completed(id)))
    }

    fn job_failed(&self, job: Job, cause: &dyn core::fmt::Display) -> Result<(), DispatchError> {
        self.finish(job, JobState::FAILED, |id| Ok(Event::failed(id, cause)?))
    }
}

fn dispatch_loop(core: &EngineCore, cancel: &CancellationToken, ctx: &HandlerContext) {
    info!(engine = %core.name, "dispatch loop started");

    while !cancel.is_cancelled() {
        let Some(event) = core.input.try_pop() else {
            core.idle();
            continue;
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| core.handle_event(&event, ctx)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(
                engine = %core.name,
                job_id = %event.job_id(),
                event_type = %event.event_type(),
                error = %err,
                "event handling failed"
            ),
            Err(_) => {
                core.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    engine = %core.name,
                    job_id = %event.job_id(),
                    event_type = %event.event_type(),
                    "handler panicked"
                );
            }
        }
    }

    info!(engine = %core.name, "dispatch loop stopped");
}
