//! Retry logic.
//!
//! # Responsibilities
//! - Re-invoke one logical operation up to `max_attempts` times
//! - Wait a bounded, optionally jittered exponential delay between attempts
//! - Surface the final attempt's error unchanged
//!
//! Every failure is retried the same way; the policy does not look at error
//! kinds. Both the operation and the inter-attempt sleep are raced against the
//! caller's [`Cancel`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::observability::metrics;
use crate::resilience::backoff::{apply_jitter, calculate_backoff, RandomSource, ThreadRandom};
use crate::resilience::error::{GuardError, GuardResult};
use crate::resilience::timeouts::Cancel;

pub use crate::config::schema::RetryPolicyConfig;

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryPolicyConfig,
    random: Arc<dyn RandomSource>,
}

impl RetryPolicy {
    /// Policy using the thread-local RNG for jitter.
    pub fn new(config: RetryPolicyConfig) -> Self {
        Self::with_random_source(config, Arc::new(ThreadRandom))
    }

    /// Policy drawing jitter from `random`.
    pub fn with_random_source(config: RetryPolicyConfig, random: Arc<dyn RandomSource>) -> Self {
        Self { config, random }
    }

    pub fn config(&self) -> &RetryPolicyConfig {
        &self.config
    }

    fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    /// Delay applied after failed attempt `attempt`, before the next one.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = calculate_backoff(
            attempt,
            self.config.base_delay(),
            self.config.backoff_factor,
            self.config.max_delay(),
        );
        if self.config.jitter_enabled {
            apply_jitter(delay, self.random.next_unit())
        } else {
            delay
        }
    }

    /// Run `operation` until it succeeds or the attempt budget is spent.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> GuardResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<GuardError>,
    {
        self.execute_until(&Cancel::never(), operation).await
    }

    /// Like [`execute`](Self::execute), stopping early when `cancel` fires.
    ///
    /// On cancellation no further attempts are made and
    /// [`GuardError::Cancelled`] is returned carrying the most recent error.
    pub async fn execute_until<T, E, F, Fut>(&self, cancel: &Cancel, mut operation: F) -> GuardResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<GuardError>,
    {
        let max_attempts = self.max_attempts();
        let mut last_error: Option<GuardError> = None;
        let mut attempt = 0;

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(GuardError::cancelled(last_error));
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GuardError::cancelled(last_error)),
                outcome = operation() => outcome,
            };

            let error = match outcome {
                Ok(value) => return Ok(value),
                Err(e) => e.into(),
            };

            if attempt >= max_attempts {
                tracing::error!(attempt, max_attempts, error = %error, "Final attempt failed");
                return Err(error);
            }

            let delay = self.delay_for(attempt);
            tracing::warn!(attempt, max_attempts, delay = ?delay, error = %error, "Attempt failed, retrying");
            metrics::record_retry(&error.kind());
            last_error = Some(error);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GuardError::cancelled(last_error)),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryPolicyConfig::default())
    }
}
