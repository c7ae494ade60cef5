//! Bounded retry with exponential backoff
//!
//! Only transient store errors (see [`StoreError::is_transient`]) are
//! retried; anything else is returned on the first attempt.

use crate::CoordinatorConfig;
use casegraph_store::StoreError;
use std::time::Duration;

/// Doubling delay sequence capped at a ceiling
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    /// Start at `initial`, never exceeding `max`
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            next: initial.min(max),
            max,
        }
    }

    /// Backoff using the configured delays
    pub fn from_config(config: &CoordinatorConfig) -> Self {
        Self::new(config.initial_backoff(), config.max_backoff())
    }

    /// Delay before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        delay
    }
}

/// Run a blocking store operation, retrying transient failures
///
/// Sleeps the current thread between attempts, so call it from blocking
/// code only (inside `spawn_blocking` or synchronous services).
pub fn retry_transient<T, F>(config: &CoordinatorConfig, what: &str, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Result<T, StoreError>,
{
    let mut backoff = Backoff::from_config(config);
    let mut attempt = 1;

    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < config.max_attempts => {
                let delay = backoff.next_delay();
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    what,
                    attempt,
                    config.max_attempts,
                    e,
                    delay
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config(max_attempts: u32) -> CoordinatorConfig {
        CoordinatorConfig {
            max_attempts,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            ..CoordinatorConfig::default()
        }
    }

    fn transient() -> StoreError {
        StoreError::Io(std::io::Error::new(std::io::ErrorKind::Interrupted, "eintr"))
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut backoff = Backoff::new(Duration::from_millis(10), Duration::from_millis(35));
        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
        assert_eq!(backoff.next_delay(), Duration::from_millis(20));
        assert_eq!(backoff.next_delay(), Duration::from_millis(35));
        assert_eq!(backoff.next_delay(), Duration::from_millis(35));
    }

    #[test]
    fn test_transient_failure_retried() {
        let mut calls = 0;
        let result = retry_transient(&fast_config(3), "write", || {
            calls += 1;
            if calls < 3 {
                Err(transient())
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_attempts_are_bounded() {
        let mut calls = 0;
        let result: Result<(), _> = retry_transient(&fast_config(2), "write", || {
            calls += 1;
            Err(transient())
        });
        assert!(result.is_err());
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_permanent_failure_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = retry_transient(&fast_config(5), "write", || {
            calls += 1;
            Err(StoreError::IdentifierCollision("http://x/A".into()))
        });
        assert!(matches!(result, Err(StoreError::IdentifierCollision(_))));
        assert_eq!(calls, 1);
    }
}
