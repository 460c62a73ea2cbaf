#![forbid(unsafe_code)]

//! Store configuration.
//!
//! Plain data with builder setters, loadable from JSON so hosts can ship
//! tuning alongside their other settings.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default period between liveness sweeps.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_millis(5_000);

/// Default time `bind` waits for its target to appear.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Default bound on back-to-back follow-up flushes run by an inline scheduler.
pub const DEFAULT_MAX_CHAINED_FLUSHES: u32 = 64;

/// Tuning knobs for a [`Store`](crate::Store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Milliseconds between liveness sweeps driven by `Store::tick`.
    pub cleanup_interval_ms: u64,
    /// Follow-up flushes an inline frame scheduler may run in a row before
    /// pending paths wait for the next write. Deferred frames are not bounded.
    pub max_chained_flushes: u32,
    /// Milliseconds `bind` waits for its target.
    pub lookup_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_ms: DEFAULT_CLEANUP_INTERVAL.as_millis() as u64,
            max_chained_flushes: DEFAULT_MAX_CHAINED_FLUSHES,
            lookup_timeout_ms: DEFAULT_LOOKUP_TIMEOUT.as_millis() as u64,
        }
    }
}

impl StoreConfig {
    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cleanup_interval_ms == 0 {
            return Err(ConfigError::Invalid("cleanup_interval_ms must be positive"));
        }
        if self.max_chained_flushes == 0 {
            return Err(ConfigError::Invalid("max_chained_flushes must be positive"));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval_ms = interval.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn with_max_chained_flushes(mut self, max: u32) -> Self {
        self.max_chained_flushes = max;
        self
    }

    #[must_use]
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout_ms = timeout.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }

    #[must_use]
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

/// Errors from loading a [`StoreConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The document is not valid JSON for this schema.
    Json(String),
    /// A field holds an unusable value.
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(msg) => write!(f, "invalid store config: {msg}"),
            Self::Invalid(msg) => write!(f, "invalid store config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}
