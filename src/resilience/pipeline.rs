//! Explicit composition of breaker and retry around a unit of work.
//!
//! ```text
//! Protection::run(operation)
//!     → RetryPolicy (outermost, optional)
//!         → CircuitBreaker::call (innermost, optional)
//!             → operation
//! ```
//!
//! Each retry attempt re-enters the breaker's gating, so an open breaker makes
//! every remaining attempt fail fast without invoking the operation.

use std::future::Future;
use std::sync::Arc;

use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::error::{GuardError, GuardResult, OperationError};
use crate::resilience::retries::RetryPolicy;
use crate::resilience::timeouts::Cancel;

/// A caller-built protection chain.
#[derive(Debug, Clone, Default)]
pub struct Protection {
    breaker: Option<Arc<CircuitBreaker>>,
    retry: Option<Arc<RetryPolicy>>,
    cancel: Cancel,
}

impl Protection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn with_retry(mut self, policy: Arc<RetryPolicy>) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn with_cancel(mut self, cancel: Cancel) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn breaker(&self) -> Option<&Arc<CircuitBreaker>> {
        self.breaker.as_ref()
    }

    pub fn retry(&self) -> Option<&Arc<RetryPolicy>> {
        self.retry.as_ref()
    }

    /// Run `operation` through the chain.
    pub async fn run<T, F, Fut>(&self, operation: F) -> GuardResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        let operation = &operation;
        match &self.retry {
            Some(policy) => {
                policy
                    .execute_until(&self.cancel, move || self.attempt(operation))
                    .await
            }
            None => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(GuardError::cancelled(None)),
                    outcome = self.attempt(operation) => outcome,
                }
            }
        }
    }

    async fn attempt<T, F, Fut>(&self, operation: &F) -> GuardResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        match &self.breaker {
            Some(breaker) => breaker.call(operation).await,
            None => operation().await.map_err(GuardError::from),
        }
    }
}
