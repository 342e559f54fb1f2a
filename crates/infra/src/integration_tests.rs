//! Integration tests for the full dispatch pipeline.
//!
//! Tests: Event → InputQueue → DispatchEngine → Handler → JobStore / OutputQueue
//!
//! Verifies:
//! - Handlers see the job's current snapshot and the raw payload
//! - Multi-step lifecycles driven purely by handlers
//! - Terminal helpers persist state and notify the output queue
//! - Handlers can be exercised against a fake engine handle

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    use chrono::Utc;
    use serde::{Deserialize, Serialize};

    use statejob_core::{Event, EventType, Job, JobId, JobKind, JobState};
    use statejob_events::{BoundedEventQueue, EventQueue};

    use crate::config::DispatchConfig;
    use crate::dispatch::{
        CancellationToken, DispatchEngine, DispatchError, EngineHandle, EventHandler,
        HandlerContext, RoutingTable,
    };
    use crate::jobs::{InMemoryJobStore, JobStore, JobStoreError};

    const START: EventType = EventType::custom(1);
    const STEP: EventType = EventType::custom(2);
    const ABORT: EventType = EventType::custom(3);
    const RUNNING: JobState = JobState::custom(0);

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Work {
        remaining: u32,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Progress {
        done: u32,
    }

    /// Pending --START--> Running --STEP*--> Completed, or --ABORT--> Failed.
    fn lifecycle_routes() -> RoutingTable {
        RoutingTable::new()
            .route_fn(JobState::PENDING, START, |mut job, _, engine, _| {
                job.advance_with(RUNNING, &Progress { done: 0 })?;
                engine.update_job(&job)?;
                engine.push_event(Event::new(job.id, STEP))?;
                Ok(())
            })
            .route_fn(RUNNING, STEP, |mut job, payload, engine, _| {
                let work: Work =
                    statejob_core::payload::decode(payload).unwrap_or(Work { remaining: 2 });
                let mut progress: Progress = job.decode_payload()?;
                progress.done += 1;
                job.advance_with(RUNNING, &progress)?;

                if progress.done >= work.remaining {
                    engine.job_completed(job)?;
                } else {
                    engine.update_job(&job)?;
                    engine.push_event(Event::with_message(job.id, STEP, &work)?)?;
                }
                Ok(())
            })
            .route_fn(RUNNING, ABORT, |job, payload, engine, _| {
                let reason = String::from_utf8_lossy(payload).into_owned();
                engine.job_failed(job, &reason)?;
                Ok(())
            })
    }

    fn setup(
        routes: RoutingTable,
        with_output: bool,
    ) -> (DispatchEngine, Arc<InMemoryJobStore>, Option<Arc<BoundedEventQueue>>) {
        statejob_observability::init();

        let store = InMemoryJobStore::arc();
        let output = with_output.then(|| Arc::new(BoundedEventQueue::new()));

        let mut builder = DispatchEngine::builder()
            .input(Arc::new(BoundedEventQueue::new()))
            .jobs(store.clone())
            .routes(routes)
            .config(DispatchConfig::default().with_name("it-engine"));
        if let Some(out) = &output {
            builder = builder.output(out.clone());
        }
        (builder.build().unwrap(), store, output)
    }

    /// Drain the input queue synchronously through `handle_event`.
    fn drain(engine: &DispatchEngine) -> Vec<Result<(), DispatchError>> {
        let mut results = Vec::new();
        while let Some(event) = engine.input().try_pop() {
            results.push(engine.handle_event(&event));
        }
        results
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(1);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn scenario_increment_handler_runs_once() {
        let a = Arc::new(AtomicUsize::new(1));
        let seen = a.clone();
        let routes = RoutingTable::new().route_fn(
            JobState::PENDING,
            EventType::from_raw(7),
            move |_, _, _, _| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        );
        let (engine, store, _) = setup(routes, false);

        let job = Job::new(JobKind::new(42));
        store.insert(job.clone()).unwrap();

        engine.input().push(Event::new(job.id, 7)).unwrap();
        let ev = engine.input().pop().unwrap();
        engine.handle_event(&ev).unwrap();
        assert_eq!(a.load(Ordering::SeqCst), 2);

        let missing = JobId::from_raw(job.id.as_u64() + 1);
        let err = engine.handle_event(&Event::new(missing, 7)).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownJob(_)));
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(a.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn handler_receives_snapshot_and_raw_payload() {
        let captured: Arc<Mutex<Option<(Job, Vec<u8>)>>> = Arc::new(Mutex::new(None));
        let sink = captured.clone();
        let routes = RoutingTable::new().route_fn(RUNNING, STEP, move |job, payload, _, _| {
            *sink.lock().unwrap() = Some((job, payload.to_vec()));
            Ok(())
        });
        let (engine, store, _) = setup(routes, false);

        let mut job = Job::with_message(JobKind::new(1), &Work { remaining: 9 }).unwrap();
        store.insert(job.clone()).unwrap();
        job.advance(RUNNING);
        store.replace(&job).unwrap();

        let event = Event::from_parts(job.id, STEP, vec![0xde, 0xad]);
        engine.handle_event(&event).unwrap();

        let (got_job, got_payload) = captured.lock().unwrap().take().unwrap();
        assert_eq!(got_job, job);
        assert_eq!(got_payload, vec![0xde, 0xad]);
    }

    #[test]
    fn lifecycle_completes_and_notifies() {
        let (engine, store, output) = setup(lifecycle_routes(), true);
        let output = output.unwrap();

        let job = Job::new(JobKind::new(5));
        store.insert(job.clone()).unwrap();
        engine.input().push(Event::new(job.id, START)).unwrap();

        let results = drain(&engine);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(Result::is_ok));

        let done = store.get(job.id).unwrap();
        assert_eq!(done.state, JobState::COMPLETED);
        assert_eq!(done.decode_payload::<Progress>().unwrap(), Progress { done: 2 });
        let ended = done.ended_at.unwrap();
        assert!((Utc::now() - ended).num_milliseconds() < 1_000);

        let notice = output.try_pop().unwrap();
        assert_eq!(notice, Event::completed(job.id));
        assert!(notice.payload().is_empty());
        assert!(output.try_pop().is_none());
    }

    #[test]
    fn abort_fails_job_with_cause() {
        let (engine, store, output) = setup(lifecycle_routes(), true);
        let output = output.unwrap();

        let mut job = Job::new(JobKind::new(5));
        job.advance(RUNNING);
        store.insert(job.clone()).unwrap();

        engine
            .handle_event(&Event::from_parts(job.id, ABORT, b"operator abort".to_vec()))
            .unwrap();

        assert_eq!(store.get(job.id).unwrap().state, JobState::FAILED);
        let notice = output.try_pop().unwrap();
        assert_eq!(notice.event_type(), EventType::FAILED);
        assert_eq!(notice.failure_message().as_deref(), Some("operator abort"));
    }

    #[test]
    fn terminal_state_stops_routing() {
        let (engine, store, _) = setup(lifecycle_routes(), false);
        let mut job = Job::new(JobKind::new(5));
        job.advance(RUNNING);
        store.insert(job.clone()).unwrap();

        engine.job_completed(store.get(job.id).unwrap()).unwrap();
        let err = engine.handle_event(&Event::new(job.id, STEP)).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownState(s) if s == JobState::COMPLETED));
    }

    #[test]
    fn job_completed_without_output_queue_only_persists() {
        let (engine, store, _) = setup(RoutingTable::new(), false);
        let job = Job::new(JobKind::new(1));
        store.insert(job.clone()).unwrap();

        engine.job_completed(job.clone()).unwrap();
        // Idempotent in effect, whatever the prior state.
        engine.job_completed(store.get(job.id).unwrap()).unwrap();

        let stored = store.get(job.id).unwrap();
        assert_eq!(stored.state, JobState::COMPLETED);
        assert!(stored.ended_at.is_some());
        assert!(engine.input().try_pop().is_none());
    }

    #[test]
    fn job_failed_emits_cause_message() {
        let (engine, store, output) = setup(RoutingTable::new(), true);
        let output = output.unwrap();
        let job = Job::new(JobKind::new(1));
        store.insert(job.clone()).unwrap();

        let cause = anyhow::anyhow!("upstream timed out");
        engine.job_failed(job.clone(), &cause).unwrap();

        let stored = store.get(job.id).unwrap();
        assert_eq!(stored.state, JobState::FAILED);
        assert!(stored.ended_at.is_some());
        assert_eq!(
            output.try_pop().unwrap().failure_message().as_deref(),
            Some("upstream timed out")
        );
    }

    #[test]
    fn job_failed_without_output_queue_only_persists() {
        let (engine, store, _) = setup(RoutingTable::new(), false);
        let job = Job::new(JobKind::new(1));
        store.insert(job.clone()).unwrap();

        engine.job_failed(job.clone(), &"disk full").unwrap();

        let stored = store.get(job.id).unwrap();
        assert_eq!(stored.state, JobState::FAILED);
        assert!(stored.ended_at.is_some());
        assert!(engine.output().is_none());
        assert!(engine.input().try_pop().is_none());
    }

    /// Handler that reports progress downstream and records whether it was delivered.
    fn progress_reporter(delivered: Arc<Mutex<Vec<bool>>>) -> RoutingTable {
        RoutingTable::new().route_fn(JobState::PENDING, STEP, move |job, _, engine, _| {
            let sent = engine.emit(Event::with_message(job.id, STEP, &Progress { done: 1 })?)?;
            delivered.lock().unwrap().push(sent);
            Ok(())
        })
    }

    #[test]
    fn emit_reaches_output_queue() {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let (engine, store, output) = setup(progress_reporter(delivered.clone()), true);
        let output = output.unwrap();
        let job = Job::new(JobKind::new(1));
        store.insert(job.clone()).unwrap();

        engine.handle_event(&Event::new(job.id, STEP)).unwrap();

        assert_eq!(*delivered.lock().unwrap(), vec![true]);
        let emitted = output.try_pop().unwrap();
        assert_eq!(emitted.job_id(), job.id);
        assert_eq!(emitted.event_type(), STEP);
        assert_eq!(emitted.decode_payload::<Progress>().unwrap(), Progress { done: 1 });
        assert!(output.try_pop().is_none());
        assert!(engine.input().try_pop().is_none());
    }

    #[test]
    fn emit_without_output_queue_reports_not_sent() {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let (engine, store, _) = setup(progress_reporter(delivered.clone()), false);
        let job = Job::new(JobKind::new(1));
        store.insert(job.clone()).unwrap();

        engine.handle_event(&Event::new(job.id, STEP)).unwrap();
        assert!(!engine.emit(Event::completed(job.id)).unwrap());

        assert_eq!(*delivered.lock().unwrap(), vec![false]);
        assert!(engine.input().try_pop().is_none());
    }

    #[test]
    fn helpers_on_unknown_job_emit_nothing() {
        let (engine, _, output) = setup(RoutingTable::new(), true);
        let output = output.unwrap();
        let ghost = Job::new(JobKind::new(1));

        let err = engine.job_completed(ghost.clone()).unwrap_err();
        assert!(matches!(err, DispatchError::Store(JobStoreError::NotFound(id)) if id == ghost.id));
        let err = engine.job_failed(ghost, &"nope").unwrap_err();
        assert!(matches!(err, DispatchError::Store(JobStoreError::NotFound(_))));
        assert!(output.try_pop().is_none());
    }

    #[test]
    fn background_loop_drives_lifecycle() {
        let (engine, store, output) = setup(lifecycle_routes(), true);
        let output = output.unwrap();
        let cancel = CancellationToken::new();
        engine.run(&cancel, HandlerContext::new()).unwrap();

        let jobs: Vec<Job> = (0..5).map(|k| Job::new(JobKind::new(k))).collect();
        for job in &jobs {
            store.insert(job.clone()).unwrap();
            engine.input().push(Event::new(job.id, START)).unwrap();
        }

        assert!(wait_for(|| {
            jobs.iter()
                .all(|j| store.get(j.id).map(|s| s.state == JobState::COMPLETED).unwrap_or(false))
        }));
        cancel.cancel();
        engine.wait();

        let mut notified = Vec::new();
        while let Some(ev) = output.try_pop() {
            notified.push(ev.job_id());
        }
        notified.sort();
        let mut expected: Vec<JobId> = jobs.iter().map(|j| j.id).collect();
        expected.sort();
        assert_eq!(notified, expected);
    }

    #[test]
    fn adjacent_events_for_one_job_are_serialized() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let log = order.clone();
        let routes = RoutingTable::new().route_fn(
            JobState::PENDING,
            STEP,
            move |job, payload, engine, _| {
                let n = payload[0];
                log.lock().unwrap().push(n);
                thread::sleep(Duration::from_millis(2));
                // Each handler sees the write made by the previous one.
                let current = engine.get_job(job.id)?;
                let mut next = current.clone();
                next.payload = vec![n];
                engine.update_job(&next)?;
                Ok(())
            },
        );
        let (engine, store, _) = setup(routes, false);
        let job = Job::new(JobKind::new(1));
        store.insert(job.clone()).unwrap();

        for n in 0..10u8 {
            engine.input().push(Event::from_parts(job.id, STEP, vec![n])).unwrap();
        }
        engine.run(&CancellationToken::new(), HandlerContext::new()).unwrap();
        assert!(wait_for(|| order.lock().unwrap().len() == 10));
        engine.shutdown_and_wait();

        assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<u8>>());
        assert_eq!(store.get(job.id).unwrap().payload, vec![9]);
    }

    /// Records what a handler asked the engine to do.
    #[derive(Default)]
    struct FakeEngine {
        pushed: Mutex<Vec<Event>>,
        completed: Mutex<Vec<JobId>>,
    }

    impl EngineHandle for FakeEngine {
        fn get_job(&self, job_id: JobId) -> Result<Job, DispatchError> {
            Err(DispatchError::UnknownJob(job_id))
        }

        fn update_job(&self, _job: &Job) -> Result<(), DispatchError> {
            Ok(())
        }

        fn push_event(&self, event: Event) -> Result<(), DispatchError> {
            self.pushed.lock().unwrap().push(event);
            Ok(())
        }

        fn emit(&self, _event: Event) -> Result<bool, DispatchError> {
            Ok(false)
        }

        fn job_completed(&self, job: Job) -> Result<(), DispatchError> {
            self.completed.lock().unwrap().push(job.id);
            Ok(())
        }

        fn job_failed(
            &self,
            _job: Job,
            _cause: &dyn std::fmt::Display,
        ) -> Result<(), DispatchError> {
            Ok(())
        }
    }

    #[test]
    fn handlers_run_against_a_fake_engine() {
        let routes = lifecycle_routes();
        let fake = FakeEngine::default();
        let job = Job::new(JobKind::new(1));

        let start = routes.resolve(JobState::PENDING, START).unwrap();
        start.handle(job.clone(), &[], &fake, &HandlerContext::new()).unwrap();
        assert_eq!(*fake.pushed.lock().unwrap(), vec![Event::new(job.id, STEP)]);

        let mut running = job.clone();
        running.advance_with(RUNNING, &Progress { done: 0 }).unwrap();
        let step = routes.resolve(RUNNING, STEP).unwrap();
        let work = statejob_core::payload::encode(&Work { remaining: 1 }).unwrap();
        step.handle(running, &work, &fake, &HandlerContext::new()).unwrap();
        assert_eq!(*fake.completed.lock().unwrap(), vec![job.id]);
    }

    #[test]
    fn custom_store_is_used() {
        /// Store that refuses every write.
        struct ReadOnly(InMemoryJobStore);

        impl JobStore for ReadOnly {
            fn insert(&self, _job: Job) -> Result<(), JobStoreError> {
                Err(JobStoreError::Storage("read only".into()))
            }
            fn get(&self, job_id: JobId) -> Result<Job, JobStoreError> {
                self.0.get(job_id)
            }
            fn replace(&self, _job: &Job) -> Result<(), JobStoreError> {
                Err(JobStoreError::Storage("read only".into()))
            }
            fn delete(&self, _job_id: JobId) -> Result<(), JobStoreError> {
                Err(JobStoreError::Storage("read only".into()))
            }
            fn len(&self) -> Result<usize, JobStoreError> {
                self.0.len()
            }
            fn list_by_state(&self, state: JobState) -> Result<Vec<Job>, JobStoreError> {
                self.0.list_by_state(state)
            }
        }

        let inner = InMemoryJobStore::new();
        let job = Job::new(JobKind::new(1));
        inner.insert(job.clone()).unwrap();

        let engine = DispatchEngine::builder()
            .input(Arc::new(BoundedEventQueue::new()))
            .jobs(Arc::new(ReadOnly(inner)))
            .routes(lifecycle_routes())
            .build()
            .unwrap();

        let err = engine.handle_event(&Event::new(job.id, START)).unwrap_err();
        assert_eq!(err.to_string(), "job store: storage error: read only");
        assert!(engine.input().try_pop().is_none());
    }
}
