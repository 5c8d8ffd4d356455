//! Recovery strategies.
//!
//! A strategy is bound to one [`ErrorKind`] and decides whether a failure of
//! that kind has been recovered from. Returning `Err` or panicking counts as
//! a failed recovery; the manager never propagates either.
//!
//! [`ErrorKind`]: crate::resilience::ErrorKind

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::resilience::error::{BoxError, GuardError};

#[async_trait]
pub trait RecoveryStrategy: Send + Sync {
    /// Attempt recovery from `error`. `Ok(true)` means recovered.
    async fn recover(&self, error: &GuardError, context: &Value) -> Result<bool, BoxError>;
}

/// Strategy backed by an async closure.
pub struct FnStrategy<F> {
    f: F,
}

/// Wrap an async closure as a [`RecoveryStrategy`].
///
/// The closure receives owned copies of the error message and context.
pub fn strategy_fn<F, Fut>(f: F) -> FnStrategy<F>
where
    F: Fn(String, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, BoxError>> + Send + 'static,
{
    FnStrategy { f }
}

#[async_trait]
impl<F, Fut> RecoveryStrategy for FnStrategy<F>
where
    F: Fn(String, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, BoxError>> + Send + 'static,
{
    async fn recover(&self, error: &GuardError, context: &Value) -> Result<bool, BoxError> {
        (self.f)(error.to_string(), context.clone()).await
    }
}

/// Waits out a cooldown, then reports the failure as recovered.
#[derive(Debug, Clone, Copy)]
pub struct WaitAndRecover {
    wait: Duration,
}

impl WaitAndRecover {
    pub fn new(wait: Duration) -> Self {
        Self { wait }
    }

    /// Preset for timeouts: 5 seconds.
    pub fn timeout_default() -> Self {
        Self::new(Duration::from_secs(5))
    }

    /// Preset for rate limits: 60 seconds.
    pub fn rate_limit_default() -> Self {
        Self::new(Duration::from_secs(60))
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }
}

#[async_trait]
impl RecoveryStrategy for WaitAndRecover {
    async fn recover(&self, error: &GuardError, _context: &Value) -> Result<bool, BoxError> {
        tracing::info!(kind = %error.kind(), wait = ?self.wait, "Waiting before treating error as recovered");
        tokio::time::sleep(self.wait).await;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::error::OperationError;

    #[tokio::test(start_paused = true)]
    async fn test_wait_and_recover() {
        let strategy = WaitAndRecover::rate_limit_default();
        let error = GuardError::from(OperationError::rate_limit("429"));

        let start = tokio::time::Instant::now();
        assert!(strategy.recover(&error, &Value::Null).await.unwrap());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(60) && elapsed < Duration::from_millis(60_010));
        assert_eq!(WaitAndRecover::timeout_default().wait(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_closure_strategy_sees_context() {
        let strategy = strategy_fn(|message: String, context: Value| async move {
            Ok(message.contains("refused") && context["retryable"] == Value::Bool(true))
        });
        let error = GuardError::from(OperationError::connection("connection refused"));

        let context = serde_json::json!({ "retryable": true });
        assert!(strategy.recover(&error, &context).await.unwrap());
        assert!(!strategy.recover(&error, &Value::Null).await.unwrap());
    }
}
