//! Engine configuration loading and representation.

use std::time::Duration;

use statejob_events::{BoundedEventQueue, DEFAULT_CAPACITY};

pub const ENV_ENGINE_NAME: &str = "STATEJOB_ENGINE_NAME";
pub const ENV_IDLE_BACKOFF_MS: &str = "STATEJOB_IDLE_BACKOFF_MS";
pub const ENV_QUEUE_CAPACITY: &str = "STATEJOB_QUEUE_CAPACITY";

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Dispatch engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Name used for the loop thread and in logs
    pub name: String,
    /// Pause between polls of an empty input queue (zero = yield only)
    pub idle_backoff: Duration,
    /// Capacity of queues built with [`DispatchConfig::queue`]
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            name: "dispatch-engine".to_string(),
            idle_backoff: Duration::from_millis(1),
            queue_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl DispatchConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Defaults overridden by `STATEJOB_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable name.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(name) = lookup(ENV_ENGINE_NAME).filter(|v| !v.trim().is_empty()) {
            config.name = name;
        }
        if let Some(raw) = lookup(ENV_IDLE_BACKOFF_MS) {
            let ms = parse(ENV_IDLE_BACKOFF_MS, &raw)?;
            config.idle_backoff = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup(ENV_QUEUE_CAPACITY) {
            let capacity = parse(ENV_QUEUE_CAPACITY, &raw)?;
            config.queue_capacity = usize::try_from(capacity).map_err(|_| ConfigError::Invalid {
                key: ENV_QUEUE_CAPACITY,
                value: raw.clone(),
            })?;
        }

        Ok(config)
    }

    /// A bounded queue sized by `queue_capacity`.
    pub fn queue(&self) -> BoundedEventQueue {
        BoundedEventQueue::with_capacity(self.queue_capacity)
    }
}

fn parse(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
    })
}
