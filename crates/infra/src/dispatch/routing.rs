//! (state × event type) → handler routing.

use std::collections::HashMap;
use std::sync::Arc;

use statejob_core::{EventType, Job, JobState};

use super::{DispatchError, EngineHandle, HandlerContext};

/// Logic invoked for one (job state, event type) pair.
///
/// The handler receives the job snapshot taken just before the call, the raw
/// event payload, a capability back into the engine and the run's context.
/// Whatever it returns is handed back to the `handle_event` caller unchanged.
/// The engine applies no transaction around the call: store writes made before
/// an error stay in place.
pub trait EventHandler: Send + Sync {
    fn handle(
        &self,
        job: Job,
        payload: &[u8],
        engine: &dyn EngineHandle,
        ctx: &HandlerContext,
    ) -> anyhow::Result<()>;
}

impl<F> EventHandler for F
where
    F: Fn(Job, &[u8], &dyn EngineHandle, &HandlerContext) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(
        &self,
        job: Job,
        payload: &[u8],
        engine: &dyn EngineHandle,
        ctx: &HandlerContext,
    ) -> anyhow::Result<()> {
        self(job, payload, engine, ctx)
    }
}

/// Two-level lookup: state → event type → handler.
///
/// Built once, before the engine, and read-only afterwards. Lookups are exact:
/// there are no wildcard or fallback entries.
#[derive(Clone, Default)]
pub struct RoutingTable {
    states: HashMap<JobState, HashMap<EventType, Arc<dyn EventHandler>>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `event_type` hitting jobs in `state`.
    /// A second registration for the same pair replaces the first.
    pub fn route<H>(mut self, state: JobState, event_type: EventType, handler: H) -> Self
    where
        H: EventHandler + 'static,
    {
        self.insert(state, event_type, Arc::new(handler));
        self
    }

    /// [`RoutingTable::route`] for closures, so their argument types are inferred.
    pub fn route_fn<F>(self, state: JobState, event_type: EventType, handler: F) -> Self
    where
        F: Fn(Job, &[u8], &dyn EngineHandle, &HandlerContext) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.route(state, event_type, handler)
    }

    /// Register an already shared handler.
    pub fn route_shared(
        mut self,
        state: JobState,
        event_type: EventType,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        self.insert(state, event_type, handler);
        self
    }

    fn insert(&mut self, state: JobState, event_type: EventType, handler: Arc<dyn EventHandler>) {
        self.states
            .entry(state)
            .or_default()
            .insert(event_type, handler);
    }

    /// Handler for `(state, event_type)`.
    pub fn resolve(
        &self,
        state: JobState,
        event_type: EventType,
    ) -> Result<Arc<dyn EventHandler>, DispatchError> {
        let events = self
            .states
            .get(&state)
            .ok_or(DispatchError::UnknownState(state))?;
        events
            .get(&event_type)
            .cloned()
            .ok_or(DispatchError::UnknownEventType { state, event_type })
    }

    /// Routed states, ascending.
    pub fn states(&self) -> Vec<JobState> {
        let mut states: Vec<_> = self.states.keys().copied().collect();
        states.sort();
        states
    }

    /// Event types routed under `state`, ascending.
    pub fn event_types(&self, state: JobState) -> Vec<EventType> {
        let mut types: Vec<_> = self
            .states
            .get(&state)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default();
        types.sort();
        types
    }

    /// Number of (state, event type) entries.
    pub fn len(&self) -> usize {
        self.states.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl core::fmt::Debug for RoutingTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut map = f.debug_map();
        for state in self.states() {
            map.entry(&format_args!("{state}"), &self.event_types(state));
        }
        map.finish()
    }
}
