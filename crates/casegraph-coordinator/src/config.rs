//! Configuration for coordinator operations
//!
//! Bounds every wait: lock acquisition, retries of transient storage
//! failures, and SQLite's busy handler.

use crate::CoordinatorError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for lock waits and retry behaviour
///
/// # Examples
///
/// ```
/// use casegraph_coordinator::CoordinatorConfig;
///
/// let config = CoordinatorConfig::default();
/// assert_eq!(config.max_attempts, 3);
///
/// let config = CoordinatorConfig::strict();
/// assert!(config.lock_timeout_ms < CoordinatorConfig::default().lock_timeout_ms);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Longest single wait for a case or classes lock (milliseconds)
    pub lock_timeout_ms: u64,

    /// Attempts per lock acquisition or transient storage operation
    pub max_attempts: u32,

    /// First backoff delay between attempts (milliseconds)
    pub initial_backoff_ms: u64,

    /// Backoff ceiling (milliseconds)
    pub max_backoff_ms: u64,

    /// SQLite busy timeout for the staging database (milliseconds)
    pub sqlite_busy_timeout_ms: u64,
}

impl Default for CoordinatorConfig {
    /// Balanced defaults
    ///
    /// - Lock wait: 5s per attempt, 3 attempts
    /// - Backoff: 50ms doubling up to 1s
    /// - SQLite busy timeout: 5s
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5_000,
            max_attempts: 3,
            initial_backoff_ms: 50,
            max_backoff_ms: 1_000,
            sqlite_busy_timeout_ms: 5_000,
        }
    }
}

impl CoordinatorConfig {
    /// Short waits, single retry; fails fast under contention
    pub fn strict() -> Self {
        Self {
            lock_timeout_ms: 500,
            max_attempts: 2,
            initial_backoff_ms: 10,
            max_backoff_ms: 100,
            sqlite_busy_timeout_ms: 1_000,
        }
    }

    /// Long waits, more retries; for slow or shared filesystems
    pub fn lenient() -> Self {
        Self {
            lock_timeout_ms: 30_000,
            max_attempts: 6,
            initial_backoff_ms: 100,
            max_backoff_ms: 5_000,
            sqlite_busy_timeout_ms: 30_000,
        }
    }

    /// Parse a configuration from TOML; missing keys take default values
    pub fn from_toml_str(s: &str) -> Result<Self, CoordinatorError> {
        let config: Self = toml::from_str(s).map_err(|e| CoordinatorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<(), CoordinatorError> {
        if self.max_attempts == 0 {
            return Err(CoordinatorError::Config("max_attempts must be at least 1".to_string()));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(CoordinatorError::Config(format!(
                "initial_backoff_ms ({}) exceeds max_backoff_ms ({})",
                self.initial_backoff_ms, self.max_backoff_ms
            )));
        }
        Ok(())
    }

    /// Lock wait as Duration
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// First backoff delay as Duration
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// Backoff ceiling as Duration
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// SQLite busy timeout as Duration
    pub fn sqlite_busy_timeout(&self) -> Duration {
        Duration::from_millis(self.sqlite_busy_timeout_ms)
    }
}
