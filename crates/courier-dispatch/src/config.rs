//! Dispatcher configuration.

use std::time::Duration;

use thiserror::Error;

/// Environment variable holding the default consistency timeout in milliseconds.
pub const TIMEOUT_ENV: &str = "COURIER_DISPATCH_TIMEOUT_MS";

/// Environment variable holding the handler worker idle timeout in milliseconds.
pub const WORKER_IDLE_ENV: &str = "COURIER_WORKER_IDLE_MS";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_WORKER_IDLE: Duration = Duration::from_secs(60);

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("invalid value for {key}: {message}")]
    Invalid {
        /// The offending key.
        key: &'static str,
        /// Why the value was rejected.
        message: String,
    },
}

/// Process-wide dispatch settings, passed to the router at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// How long a strongly consistent dispatch waits when the call does not
    /// set its own timeout.
    pub default_timeout: Duration,
    /// How long a per-stream handler worker lingers without events before it
    /// exits. The next event for that stream starts a fresh worker.
    pub worker_idle_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            worker_idle_timeout: DEFAULT_WORKER_IDLE,
        }
    }
}

impl DispatcherConfig {
    /// Creates a configuration with the given default timeout.
    #[must_use]
    pub fn with_default_timeout(default_timeout: Duration) -> Self {
        Self {
            default_timeout,
            ..Self::default()
        }
    }

    /// Sets the handler worker idle timeout.
    #[must_use]
    pub fn with_worker_idle_timeout(mut self, worker_idle_timeout: Duration) -> Self {
        self.worker_idle_timeout = worker_idle_timeout;
        self
    }

    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, falling back to defaults for
    /// unset keys.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a value is not a positive integer.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(timeout) = millis(&lookup, TIMEOUT_ENV)? {
            config.default_timeout = timeout;
        }
        if let Some(idle) = millis(&lookup, WORKER_IDLE_ENV)? {
            config.worker_idle_timeout = idle;
        }

        Ok(config)
    }
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let millis: u64 = raw.trim().parse().map_err(|e| ConfigError::Invalid {
        key,
        message: format!("{raw:?} is not a number of milliseconds: {e}"),
    })?;
    if millis == 0 {
        return Err(ConfigError::Invalid {
            key,
            message: "value must be greater than zero".to_owned(),
        });
    }
    Ok(Some(Duration::from_millis(millis)))
}
