//! Tracing/logging initialization.
//!
//! Two optional layers over one filter:
//! - a human-readable console layer on stdout (`verbose`)
//! - a JSON layer appending to a log file (`file`; under `/logs` in containers)
//!
//! The filter comes from `RUST_LOG` when set, otherwise `debug` or `info`.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Directory log files go to when running in a container.
pub const CONTAINER_LOG_DIR: &str = "/logs";

pub const ENV_DEBUG: &str = "STATEJOB_LOG_DEBUG";
pub const ENV_VERBOSE: &str = "STATEJOB_LOG_VERBOSE";
pub const ENV_CONTAINER: &str = "STATEJOB_LOG_CONTAINER";
pub const ENV_FILE: &str = "STATEJOB_LOG_FILE";

#[derive(Debug, thiserror::Error)]
pub enum LogInitError {
    #[error("failed to open log file {path}: {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Logging options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConfig {
    /// Default level `debug` instead of `info`
    pub debug: bool,
    /// Also log to stdout
    pub verbose: bool,
    /// Resolve `file` inside [`CONTAINER_LOG_DIR`]
    pub container: bool,
    /// JSON log file (appended)
    pub file: Option<PathBuf>,
}

impl LogConfig {
    /// Console-only logging at `info`.
    pub fn console() -> Self {
        Self {
            verbose: true,
            ..Self::default()
        }
    }

    pub fn with_debug(mut self) -> Self {
        self.debug = true;
        self
    }

    pub fn with_verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    pub fn with_container(mut self) -> Self {
        self.container = true;
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Read `STATEJOB_LOG_*` variables; unset means console-only at `info`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str| {
            lookup(key).is_some_and(|v| matches!(v.trim(), "1" | "true" | "yes" | "on"))
        };
        let file = lookup(ENV_FILE)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Self {
            debug: flag(ENV_DEBUG),
            // Without a file, stdout is the only place logs can go.
            verbose: flag(ENV_VERBOSE) || file.is_none(),
            container: flag(ENV_CONTAINER),
            file,
        }
    }

    /// Where the JSON layer writes, if anywhere.
    pub fn file_path(&self) -> Option<PathBuf> {
        let file = self.file.as_ref()?;
        if self.container {
            Some(Path::new(CONTAINER_LOG_DIR).join(file))
        } else {
            Some(file.clone())
        }
    }

    fn default_directive(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }
}

/// Initialize logging from the environment.
///
/// Safe to call multiple times (subsequent calls are no-ops). An unusable log
/// file is reported on stderr, since no subscriber exists yet to carry it.
pub fn init() {
    init_or_report(&LogConfig::from_env());
}

/// `init_with`, printing a failure to stderr. False when logging is unavailable.
fn init_or_report(config: &LogConfig) -> bool {
    match init_with(config) {
        Ok(_) => true,
        Err(err) => {
            eprintln!("statejob: logging not initialized: {err}");
            false
        }
    }
}

/// Initialize logging with explicit options.
///
/// Returns `Ok(false)` when a global subscriber was already installed.
pub fn init_with(config: &LogConfig) -> Result<bool, LogInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    let console = config.verbose.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(true)
    });

    let json = match config.file_path() {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| LogInitError::OpenFile {
                    path: path.clone(),
                    source,
                })?;
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_timer(tracing_subscriber::fmt::time::SystemTime)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(json)
        .try_init()
        .is_ok();

    if installed {
        ::tracing::info!(debug = config.debug, "logging initialized");
    }
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_logs_to_console() {
        let config = LogConfig::from_lookup(lookup(&[]));
        assert_eq!(config, LogConfig::console());
        assert_eq!(config.default_directive(), "info");
        assert_eq!(config.file_path(), None);
    }

    #[test]
    fn file_only_unless_verbose() {
        let config =
            LogConfig::from_lookup(lookup(&[(ENV_FILE, "engine.log"), (ENV_DEBUG, "true")]));
        assert!(!config.verbose);
        assert!(config.debug);
        assert_eq!(config.file_path(), Some(PathBuf::from("engine.log")));

        let config =
            LogConfig::from_lookup(lookup(&[(ENV_FILE, "engine.log"), (ENV_VERBOSE, "1")]));
        assert!(config.verbose);
    }

    #[test]
    fn container_mode_moves_file_under_logs() {
        let config = LogConfig::default().with_file("engine.log").with_container();
        assert_eq!(config.file_path(), Some(PathBuf::from("/logs/engine.log")));
    }

    #[test]
    fn unopenable_file_is_reported() {
        let config = LogConfig::default().with_file("/definitely/missing/dir/engine.log");
        let err = init_with(&config).unwrap_err();
        assert!(matches!(err, LogInitError::OpenFile { .. }));
    }

    #[test]
    fn init_failure_is_surfaced() {
        let broken = LogConfig::default().with_file("/definitely/missing/dir/engine.log");
        assert!(!init_or_report(&broken));
        assert!(init_or_report(&LogConfig::console()));
    }

    #[test]
    fn repeated_init_is_harmless() {
        init();
        init();
        assert!(!init_with(&LogConfig::console().with_debug()).unwrap());
    }
}
