//! Bounded exponential backoff for transient provider failures.

use std::time::Duration;

use engram_core::config::EmbeddingConfig;
use engram_core::errors::{EmbeddingError, EngramError, EngramResult};
use tracing::{debug, warn};

/// How often and how patiently to retry a provider call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.backoff_multiplier.max(1.0),
        }
    }

    /// No retries, no waiting.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based):
    /// `initial * multiplier^(retry-1)`, capped at `max_backoff`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = self.multiplier.powi(retry.saturating_sub(1) as i32);
        let millis = self.initial_backoff.as_millis() as f64 * factor;
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    /// Exhausted transient failures become `TemporarilyUnavailable`.
    pub fn run<T>(
        &self,
        provider: &str,
        mut op: impl FnMut() -> EngramResult<T>,
    ) -> EngramResult<T> {
        let mut last: Option<EngramError> = None;
        for attempt in 0..self.max_attempts() {
            if attempt > 0 {
                let delay = self.delay_for(attempt);
                debug!(provider, attempt, delay_ms = delay.as_millis() as u64, "retrying");
                std::thread::sleep(delay);
            }
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    warn!(provider, attempt, error = %e, "transient embedding failure");
                    last = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(exhausted(self.max_attempts(), last))
    }
}

/// The error reported once every attempt failed transiently.
pub fn exhausted(attempts: u32, last: Option<EngramError>) -> EngramError {
    EmbeddingError::TemporarilyUnavailable {
        attempts,
        reason: last
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string()),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            multiplier: 2.0,
        }
    }

    #[test]
    fn delay_grows_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
            multiplier: 2.0,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for(9), Duration::from_millis(350));
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let out = fast_policy(3).run("test", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(EmbeddingError::RateLimited {
                    provider: "test".into(),
                }
                .into())
            } else {
                Ok(7)
            }
        });
        assert_eq!(out.unwrap(), 7);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn exhaustion_is_temporarily_unavailable() {
        let calls = Cell::new(0);
        let err = fast_policy(2)
            .run::<()>("test", || {
                calls.set(calls.get() + 1);
                Err(EmbeddingError::RateLimited {
                    provider: "test".into(),
                }
                .into())
            })
            .unwrap_err();
        assert_eq!(calls.get(), 3);
        assert!(matches!(
            err,
            EngramError::EmbeddingError(EmbeddingError::TemporarilyUnavailable { attempts: 3, .. })
        ));
        assert!(err.is_transient());
    }

    #[test]
    fn permanent_failure_is_not_retried() {
        let calls = Cell::new(0);
        let err = fast_policy(5)
            .run::<()>("test", || {
                calls.set(calls.get() + 1);
                Err(EmbeddingError::EmptyInput.into())
            })
            .unwrap_err();
        assert_eq!(calls.get(), 1);
        assert!(!err.is_transient());
    }
}
