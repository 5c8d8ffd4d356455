//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Root configuration for the invocation guard.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Endpoint selection settings.
    pub selector: SelectorConfig,

    /// Active health probe settings.
    pub health_check: HealthCheckConfig,

    /// Named circuit breakers.
    pub breakers: Vec<NamedBreakerConfig>,

    /// Named retry policies.
    pub retry_policies: Vec<NamedRetryConfig>,

    /// Candidate endpoints.
    pub endpoints: Vec<EndpointConfig>,
}

/// Circuit breaker options.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures while closed before the breaker opens.
    pub failure_threshold: u32,

    /// Seconds an open breaker waits before admitting trial calls.
    pub recovery_timeout_secs: u64,

    /// Successes while half-open before the breaker closes.
    pub success_threshold: u32,

    /// Trial calls admitted while half-open.
    pub half_open_max_calls: u32,
}

impl CircuitBreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_secs: 60,
            success_threshold: 3,
            half_open_max_calls: 3,
        }
    }
}

/// A circuit breaker registered under a name.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NamedBreakerConfig {
    pub name: String,

    #[serde(flatten)]
    pub settings: CircuitBreakerConfig,
}

/// Retry policy options. Immutable once a policy is built from it.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicyConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,

    /// Delay before the second attempt in milliseconds.
    pub base_delay_ms: u64,

    /// Upper bound on any single delay in milliseconds.
    pub max_delay_ms: u64,

    /// Multiplier applied per attempt.
    pub backoff_factor: f64,

    /// Scale each delay by a uniform factor in [0.5, 1.0].
    pub jitter_enabled: bool,
}

impl RetryPolicyConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            backoff_factor: 2.0,
            jitter_enabled: true,
        }
    }
}

/// A retry policy registered under a name.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NamedRetryConfig {
    pub name: String,

    #[serde(flatten)]
    pub settings: RetryPolicyConfig,
}

/// Candidate endpoint definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Unique endpoint identifier (e.g. a model id).
    pub id: String,

    /// Free-text descriptor.
    #[serde(default)]
    pub description: String,

    /// Requests-per-minute ceiling. No cap when absent.
    #[serde(default)]
    pub rate_limit_rpm: Option<u32>,

    /// URL probed by the HTTP health probe.
    #[serde(default)]
    pub health_url: Option<Url>,
}

/// Endpoint selection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Consecutive failures that make an endpoint unavailable.
    pub circuit_breaker_threshold: u32,

    /// Sliding rate-limit window in seconds.
    pub rate_window_secs: u64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            circuit_breaker_threshold: 5,
            rate_window_secs: 60,
        }
    }
}

/// Active health probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health probes.
    pub enabled: bool,

    /// Probe round interval in seconds.
    pub interval_secs: u64,

    /// Per-probe timeout in seconds.
    pub timeout_secs: u64,

    /// Seconds after its last failure before an unavailable endpoint is re-probed.
    pub unavailable_cooldown_secs: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
            timeout_secs: 10,
            unavailable_cooldown_secs: 300,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Alert records kept in memory. The oldest are dropped past this.
    pub max_alerts: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
            max_alerts: 1000,
        }
    }
}
