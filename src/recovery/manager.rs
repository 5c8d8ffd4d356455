//! Recovery manager.
//!
//! # Responsibilities
//! - Own named circuit breakers and retry policies
//! - Run operations through them (retry outermost, breaker innermost)
//! - Dispatch failures to per-kind recovery strategies
//! - Keep global error counters and an alert log
//! - Report system health

use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use futures_util::FutureExt;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::config::schema::GuardConfig;
use crate::observability::metrics;
use crate::recovery::alerts::{AlertLog, AlertRecord};
use crate::recovery::report::SystemHealth;
use crate::recovery::strategy::RecoveryStrategy;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::resilience::classify::ErrorMetrics;
use crate::resilience::error::{ErrorKind, GuardError, GuardResult, OperationError};
use crate::resilience::pipeline::Protection;
use crate::resilience::retries::RetryPolicy;
use crate::resilience::timeouts::Cancel;

/// Top-level façade over breakers, retry policies and recovery strategies.
#[derive(Default)]
pub struct RecoveryManager {
    circuit_breakers: DashMap<String, Arc<CircuitBreaker>>,
    retry_policies: DashMap<String, Arc<RetryPolicy>>,
    strategies: DashMap<ErrorKind, Arc<dyn RecoveryStrategy>>,
    error_metrics: Mutex<ErrorMetrics>,
    recovery_attempts: AtomicU64,
    recovery_successes: AtomicU64,
    alerts: AlertLog,
}

impl RecoveryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager keeping at most `max_alerts` alert records.
    pub fn with_alert_capacity(max_alerts: usize) -> Self {
        Self {
            alerts: AlertLog::with_capacity(max_alerts),
            ..Self::default()
        }
    }

    /// Manager with every configured breaker and retry policy registered.
    pub fn from_config(config: &GuardConfig) -> Self {
        let manager = Self::with_alert_capacity(config.observability.max_alerts);
        for breaker in &config.breakers {
            manager.register_circuit_breaker(breaker.name.clone(), breaker.settings.clone());
        }
        for policy in &config.retry_policies {
            manager.register_retry_policy(policy.name.clone(), RetryPolicy::new(policy.settings.clone()));
        }
        manager
    }

    /// Register a breaker under `name`, replacing any previous one.
    pub fn register_circuit_breaker(&self, name: impl Into<String>, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        let name = name.into();
        let breaker = Arc::new(CircuitBreaker::new(name.clone(), config));
        if self.circuit_breakers.insert(name.clone(), breaker.clone()).is_some() {
            tracing::warn!(breaker = %name, "Circuit breaker replaced");
        } else {
            tracing::info!(breaker = %name, "Circuit breaker registered");
        }
        breaker
    }

    /// Register a retry policy under `name`, replacing any previous one.
    pub fn register_retry_policy(&self, name: impl Into<String>, policy: RetryPolicy) -> Arc<RetryPolicy> {
        let name = name.into();
        let policy = Arc::new(policy);
        self.retry_policies.insert(name.clone(), policy.clone());
        tracing::info!(
            policy = %name,
            max_attempts = policy.config().max_attempts,
            "Retry policy registered"
        );
        policy
    }

    /// Bind `strategy` to `kind`. The last registration for a kind wins.
    pub fn register_recovery_strategy(&self, kind: impl Into<ErrorKind>, strategy: impl RecoveryStrategy + 'static) {
        let kind = kind.into();
        tracing::info!(%kind, "Recovery strategy registered");
        self.strategies.insert(kind, Arc::new(strategy));
    }

    pub fn circuit_breaker(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.circuit_breakers.get(name).map(|entry| entry.value().clone())
    }

    pub fn retry_policy(&self, name: &str) -> Option<Arc<RetryPolicy>> {
        self.retry_policies.get(name).map(|entry| entry.value().clone())
    }

    /// Protection chain for the named breaker and retry policy.
    /// Unknown names are skipped.
    pub fn protection(&self, breaker: Option<&str>, retry_policy: Option<&str>) -> Protection {
        let mut protection = Protection::new();
        if let Some(name) = breaker {
            match self.circuit_breaker(name) {
                Some(breaker) => protection = protection.with_breaker(breaker),
                None => tracing::warn!(breaker = %name, "Unknown circuit breaker, calling unprotected"),
            }
        }
        if let Some(name) = retry_policy {
            match self.retry_policy(name) {
                Some(policy) => protection = protection.with_retry(policy),
                None => tracing::warn!(policy = %name, "Unknown retry policy, calling without retries"),
            }
        }
        protection
    }

    /// Run `operation` through the named breaker and retry policy.
    pub async fn execute_with_protection<T, F, Fut>(
        &self,
        operation: F,
        breaker: Option<&str>,
        retry_policy: Option<&str>,
    ) -> GuardResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        self.execute_with_protection_until(operation, breaker, retry_policy, Cancel::never())
            .await
    }

    /// Like [`execute_with_protection`](Self::execute_with_protection), giving
    /// up when `cancel` fires.
    pub async fn execute_with_protection_until<T, F, Fut>(
        &self,
        operation: F,
        breaker: Option<&str>,
        retry_policy: Option<&str>,
        cancel: Cancel,
    ) -> GuardResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        let protection = self.protection(breaker, retry_policy).with_cancel(cancel);
        let outcome = protection.run(operation).await;

        match &outcome {
            Ok(_) => self.lock_metrics().record_success(),
            Err(error) => {
                let kind = error.kind();
                let severity = kind.severity();
                self.lock_metrics().record_error(&kind, severity);
                tracing::error!(
                    breaker = breaker.unwrap_or("-"),
                    retry_policy = retry_policy.unwrap_or("-"),
                    %kind,
                    %severity,
                    error = %error,
                    "Protected call failed"
                );
                self.alerts.append(AlertRecord::new(
                    &kind,
                    severity,
                    json!({
                        "source": "execute_with_protection",
                        "breaker": breaker,
                        "retry_policy": retry_policy,
                        "message": error.to_string(),
                    }),
                ));
            }
        }

        outcome
    }

    /// Run the strategy registered for `error`'s kind.
    ///
    /// A missing strategy, an `Err` from the strategy or a panic inside it all
    /// count as a failed recovery; none of them propagate.
    pub async fn attempt_recovery(&self, error: &GuardError, context: &Value) -> bool {
        let kind = error.kind();
        self.recovery_attempts.fetch_add(1, Ordering::Relaxed);

        let strategy = self.strategies.get(&kind).map(|entry| entry.value().clone());
        let recovered = match strategy {
            None => {
                tracing::warn!(%kind, "No recovery strategy registered");
                false
            }
            Some(strategy) => match AssertUnwindSafe(strategy.recover(error, context)).catch_unwind().await {
                Ok(Ok(recovered)) => recovered,
                Ok(Err(e)) => {
                    tracing::error!(%kind, error = %e, "Recovery strategy failed");
                    false
                }
                Err(_) => {
                    tracing::error!(%kind, "Recovery strategy panicked");
                    false
                }
            },
        };

        if recovered {
            self.recovery_successes.fetch_add(1, Ordering::Relaxed);
            tracing::info!(%kind, "Recovery successful");
        }
        metrics::record_recovery(&kind, recovered);
        self.alerts.append(AlertRecord::new(
            &kind,
            kind.severity(),
            json!({
                "source": "attempt_recovery",
                "recovered": recovered,
                "message": error.to_string(),
                "context": context,
            }),
        ));

        recovered
    }

    /// Attempt recovery and fail with [`GuardError::RecoveryFailed`] if it
    /// was not achieved.
    pub async fn recover_or_fail(&self, error: GuardError, context: &Value) -> GuardResult<()> {
        if self.attempt_recovery(&error, context).await {
            Ok(())
        } else {
            Err(GuardError::RecoveryFailed {
                kind: error.kind(),
                error: Box::new(error),
            })
        }
    }

    /// Current state of every breaker plus global counters.
    pub fn get_system_health(&self) -> SystemHealth {
        let details: BTreeMap<_, _> = self
            .circuit_breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().status()))
            .collect();
        let error_metrics = self.lock_metrics().snapshot(Instant::now());

        SystemHealth {
            total_errors: error_metrics.total_errors,
            consecutive_errors: error_metrics.consecutive_errors,
            error_metrics,
            recovery_attempts: self.recovery_attempts.load(Ordering::Relaxed),
            recovery_successes: self.recovery_successes.load(Ordering::Relaxed),
            alert_count: self.alerts.len(),
            ..Default::default()
        }
        .with_breakers(details)
    }

    pub fn alerts(&self) -> &AlertLog {
        &self.alerts
    }

    fn lock_metrics(&self) -> MutexGuard<'_, ErrorMetrics> {
        self.error_metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
