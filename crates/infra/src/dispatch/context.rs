//! Extra arguments threaded from `run` down to every handler invocation.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable typed context bag.
///
/// Holds at most one value per type. Cloning is cheap (shared map), and a
/// context never changes once handed to the engine; `with` builds a new one.
#[derive(Clone, Default)]
pub struct HandlerContext {
    values: Arc<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl HandlerContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of this context with `value` added (replacing any value of the same type).
    pub fn with<T: Any + Send + Sync>(&self, value: T) -> Self {
        let mut values = (*self.values).clone();
        values.insert(TypeId::of::<T>(), Arc::new(value));
        Self {
            values: Arc::new(values),
        }
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|v| (**v).downcast_ref::<T>())
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl core::fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandlerContext")
            .field("values", &self.values.len())
            .finish()
    }
}
