//! Circuit breaker for endpoint protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: resource assumed down, calls fail fast
//! - Half-Open: a limited number of trial calls test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → Half-Open: recovery_timeout elapsed since last failure (checked on call)
//! Half-Open → Closed: success_count >= success_threshold
//! Half-Open → Open: any failure
//! ```
//!
//! A success while closed decays `failure_count` by one instead of resetting it.
//! Admission, including the half-open check-and-increment, happens under the
//! breaker's lock; the operation itself runs with the lock released. A
//! half-open trial dropped before it produces an outcome gives its slot back.

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::time::Instant;

use crate::observability::metrics;
use crate::resilience::classify::ErrorMetrics;
use crate::resilience::error::{ErrorKind, GuardError, GuardResult, OperationError, RejectReason};

pub use crate::config::schema::CircuitBreakerConfig;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<Instant>,
    half_open_calls_made: u32,
    /// Bumped on every entry to half-open. Trial slots belong to one epoch.
    half_open_epoch: u64,
    metrics: ErrorMetrics,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
            half_open_calls_made: 0,
            half_open_epoch: 0,
            metrics: ErrorMetrics::default(),
        }
    }
}

/// Point-in-time view of a breaker, as reported in system health.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStatus {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub half_open_calls_made: u32,
    pub seconds_since_last_failure: Option<f64>,
    pub metrics: ErrorMetrics,
}

/// Circuit breaker guarding one named resource.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        metrics::record_breaker_state(&name, CircuitState::Closed);
        Self {
            name,
            config,
            inner: Mutex::new(BreakerState::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Stored state. An open breaker whose timeout has elapsed still reports
    /// `Open` until the next call moves it to half-open.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Execute `operation` subject to gating.
    ///
    /// Rejections return [`GuardError::CircuitOpen`] without invoking the
    /// operation. Operation failures are recorded and returned unchanged.
    pub async fn call<T, F, Fut>(&self, operation: F) -> GuardResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        let mut slot = TrialSlot {
            breaker: self,
            epoch: self.admit()?,
        };

        let outcome = operation().await;
        slot.epoch = None;

        match outcome {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(error) => {
                self.on_failure(error.kind());
                Err(GuardError::Operation(error))
            }
        }
    }

    /// Snapshot of counters and error metrics.
    pub fn status(&self) -> BreakerStatus {
        let now = Instant::now();
        let inner = self.lock();
        BreakerStatus {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            half_open_calls_made: inner.half_open_calls_made,
            seconds_since_last_failure: inner
                .last_failure_time
                .map(|at| now.saturating_duration_since(at).as_secs_f64()),
            metrics: inner.metrics.snapshot(now),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the half-open epoch when the call took a trial slot.
    fn admit(&self) -> GuardResult<Option<u64>> {
        let mut inner = self.lock();

        if inner.state == CircuitState::Open {
            let recovered = inner
                .last_failure_time
                .map(|at| at.elapsed() >= self.config.recovery_timeout())
                .unwrap_or(false);
            if !recovered {
                return Err(self.reject(RejectReason::Open));
            }
            self.transition(&mut inner, CircuitState::HalfOpen);
            inner.half_open_calls_made = 0;
            inner.half_open_epoch += 1;
        }

        if inner.state == CircuitState::HalfOpen {
            if inner.half_open_calls_made >= self.config.half_open_max_calls {
                return Err(self.reject(RejectReason::HalfOpenLimit));
            }
            inner.half_open_calls_made += 1;
            return Ok(Some(inner.half_open_epoch));
        }

        Ok(None)
    }

    fn release_slot(&self, epoch: u64) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen && inner.half_open_epoch == epoch {
            inner.half_open_calls_made = inner.half_open_calls_made.saturating_sub(1);
            tracing::debug!(
                breaker = %self.name,
                half_open_calls_made = inner.half_open_calls_made,
                "Half-open trial dropped without outcome"
            );
        }
    }

    fn reject(&self, reason: RejectReason) -> GuardError {
        tracing::debug!(breaker = %self.name, %reason, "Call rejected");
        metrics::record_rejection(&self.name, reason);
        GuardError::CircuitOpen {
            name: self.name.clone(),
            reason,
        }
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    self.transition(&mut inner, CircuitState::Closed);
                    inner.failure_count = 0;
                    inner.success_count = 0;
                }
            }
            CircuitState::Closed => {
                inner.failure_count = inner.failure_count.saturating_sub(1);
            }
            CircuitState::Open => {}
        }
        inner.metrics.record_success();
        metrics::record_call(&self.name, "success");
    }

    fn on_failure(&self, kind: &ErrorKind) {
        let severity = kind.severity();
        let mut inner = self.lock();
        inner.failure_count += 1;
        inner.last_failure_time = Some(Instant::now());
        inner.metrics.record_error(kind, severity);

        tracing::debug!(
            breaker = %self.name,
            kind = %kind,
            %severity,
            failure_count = inner.failure_count,
            "Call failed"
        );

        match inner.state {
            CircuitState::HalfOpen => {
                self.transition(&mut inner, CircuitState::Open);
                inner.success_count = 0;
            }
            CircuitState::Closed if inner.failure_count >= self.config.failure_threshold => {
                self.transition(&mut inner, CircuitState::Open);
            }
            _ => {}
        }
        metrics::record_call(&self.name, "failure");
    }

    fn transition(&self, inner: &mut BreakerState, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        match to {
            CircuitState::Open => tracing::warn!(
                breaker = %self.name,
                %from,
                failure_count = inner.failure_count,
                "Circuit breaker OPEN"
            ),
            CircuitState::HalfOpen => tracing::info!(breaker = %self.name, "Circuit breaker entering HALF_OPEN"),
            CircuitState::Closed => tracing::info!(breaker = %self.name, "Circuit breaker CLOSED, resource recovered"),
        }
        metrics::record_breaker_state(&self.name, to);
    }
}

/// Half-open trial slot held while an admitted call is in flight.
struct TrialSlot<'a> {
    breaker: &'a CircuitBreaker,
    epoch: Option<u64>,
}

impl Drop for TrialSlot<'_> {
    fn drop(&mut self) {
        if let Some(epoch) = self.epoch {
            self.breaker.release_slot(epoch);
        }
    }
}
