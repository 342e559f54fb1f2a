//! Infrastructure layer: job storage, routing and the dispatch engine.

pub mod config;
pub mod dispatch;
pub mod jobs;

mod integration_tests;

pub use config::{ConfigError, DispatchConfig};
pub use dispatch::{
    CancellationToken, DispatchEngine, DispatchEngineBuilder, DispatchError, DispatchStats,
    EngineHandle, EventHandler, HandlerContext, RoutingTable,
};
pub use jobs::{InMemoryJobStore, JobStore, JobStoreError};
