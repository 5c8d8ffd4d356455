//! Endpoint abstraction.
//!
//! # Responsibilities
//! - Represent a single candidate endpoint (identity and declared capacity)
//! - Track its selection status
//! - Own its rolling request metrics
//!
//! Identity and capacity are fixed at construction; the invocation layer only
//! mutates status and metrics.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::schema::EndpointConfig;
use crate::selection::score::health_score;

/// Endpoint status.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointStatus {
    Available = 0,
    Unavailable = 1,
    RateLimited = 2,
    Error = 3,
    Testing = 4,
}

impl From<u8> for EndpointStatus {
    fn from(val: u8) -> Self {
        match val {
            1 => EndpointStatus::Unavailable,
            2 => EndpointStatus::RateLimited,
            3 => EndpointStatus::Error,
            4 => EndpointStatus::Testing,
            _ => EndpointStatus::Available,
        }
    }
}

/// Rolling request counters for one endpoint.
#[derive(Debug, Clone, Default)]
pub struct EndpointMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Running mean of observed latencies, in seconds.
    pub average_response_time: f64,
    /// Number of latencies folded into the mean.
    pub latency_samples: u64,
    pub consecutive_failures: u32,
    pub last_success: Option<Instant>,
    pub last_failure: Option<Instant>,
}

impl EndpointMetrics {
    /// `failed / total`, or 0 when nothing has been recorded.
    pub fn error_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.failed_requests as f64 / self.total_requests as f64
        }
    }

    pub fn record_success(&mut self, response_time: Option<Duration>, now: Instant) {
        self.total_requests += 1;
        self.successful_requests += 1;
        self.consecutive_failures = 0;
        self.last_success = Some(now);

        if let Some(latency) = response_time {
            self.latency_samples += 1;
            let n = self.latency_samples as f64;
            self.average_response_time =
                (self.average_response_time * (n - 1.0) + latency.as_secs_f64()) / n;
        }
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.total_requests += 1;
        self.failed_requests += 1;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure = Some(now);
    }
}

/// A candidate endpoint.
#[derive(Debug)]
pub struct Endpoint {
    id: String,
    description: String,
    rate_limit_rpm: Option<u32>,
    status: AtomicU8,
    metrics: Mutex<EndpointMetrics>,
}

impl Endpoint {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            rate_limit_rpm: None,
            status: AtomicU8::new(EndpointStatus::Available as u8),
            metrics: Mutex::new(EndpointMetrics::default()),
        }
    }

    /// Declare a requests-per-minute ceiling.
    pub fn with_rate_limit(mut self, rpm: u32) -> Self {
        self.rate_limit_rpm = Some(rpm);
        self
    }

    pub fn from_config(config: &EndpointConfig) -> Self {
        let endpoint = Self::new(config.id.clone(), config.description.clone());
        match config.rate_limit_rpm {
            Some(rpm) => endpoint.with_rate_limit(rpm),
            None => endpoint,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn rate_limit_rpm(&self) -> Option<u32> {
        self.rate_limit_rpm
    }

    pub fn status(&self) -> EndpointStatus {
        EndpointStatus::from(self.status.load(Ordering::Acquire))
    }

    pub fn set_status(&self, status: EndpointStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    /// Move to `to` only if the current status is `from`.
    pub fn transition_status(&self, from: EndpointStatus, to: EndpointStatus) -> bool {
        self.status
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_available(&self) -> bool {
        self.status() == EndpointStatus::Available
    }

    /// Copy of the current metrics.
    pub fn metrics(&self) -> EndpointMetrics {
        self.lock_metrics().clone()
    }

    /// Apply `update` to the metrics under the endpoint's lock.
    pub fn update_metrics<R>(&self, update: impl FnOnce(&mut EndpointMetrics) -> R) -> R {
        update(&mut self.lock_metrics())
    }

    /// Current health score in `[0.0, 1.0]`.
    pub fn health_score(&self) -> f64 {
        health_score(self.status(), &self.metrics(), Instant::now())
    }

    fn lock_metrics(&self) -> MutexGuard<'_, EndpointMetrics> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        let endpoint = Endpoint::new("m1", "test model");
        assert_eq!(endpoint.status(), EndpointStatus::Available);

        endpoint.set_status(EndpointStatus::Testing);
        assert_eq!(endpoint.status(), EndpointStatus::Testing);

        assert!(!endpoint.transition_status(EndpointStatus::Available, EndpointStatus::RateLimited));
        assert!(endpoint.transition_status(EndpointStatus::Testing, EndpointStatus::Error));
        assert_eq!(endpoint.status(), EndpointStatus::Error);
    }

    #[test]
    fn test_metrics_accounting() {
        let now = Instant::now();
        let mut metrics = EndpointMetrics::default();
        assert_eq!(metrics.error_rate(), 0.0);

        metrics.record_success(Some(Duration::from_secs(1)), now);
        metrics.record_success(Some(Duration::from_secs(3)), now);
        metrics.record_failure(now);
        metrics.record_failure(now);

        assert_eq!(metrics.total_requests, 4);
        assert_eq!(metrics.successful_requests + metrics.failed_requests, metrics.total_requests);
        assert_eq!(metrics.average_response_time, 2.0);
        assert_eq!(metrics.consecutive_failures, 2);
        assert_eq!(metrics.error_rate(), 0.5);

        metrics.record_success(None, now);
        assert_eq!(metrics.consecutive_failures, 0);
        assert_eq!(metrics.average_response_time, 2.0);
        assert_eq!(metrics.latency_samples, 2);
    }

    #[test]
    fn test_from_config() {
        let config = EndpointConfig {
            id: "llama:free".into(),
            description: "Llama".into(),
            rate_limit_rpm: Some(20),
            health_url: None,
        };
        let endpoint = Endpoint::from_config(&config);
        assert_eq!(endpoint.id(), "llama:free");
        assert_eq!(endpoint.rate_limit_rpm(), Some(20));
    }
}
