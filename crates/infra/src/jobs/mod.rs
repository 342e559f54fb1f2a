//! Job storage.
//!
//! The dispatch engine only needs four operations from a store (insert, get,
//! replace, delete). Any implementation honouring [`JobStore`] can be swapped in
//! without engine changes; [`InMemoryJobStore`] is the default.

pub mod store;

pub use store::{InMemoryJobStore, JobStore, JobStoreError};
