//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds and attempts >= 1, backoff factor > 1)
//! - Detect duplicate breaker, retry policy and endpoint names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::{CircuitBreakerConfig, GuardConfig, RetryPolicyConfig};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{section} '{name}': {field} must be at least 1")]
    ZeroValue {
        section: &'static str,
        name: String,
        field: &'static str,
    },

    #[error("breaker '{name}': success_threshold ({success}) exceeds half_open_max_calls ({max_calls})")]
    UnreachableClose { name: String, success: u32, max_calls: u32 },

    #[error("retry policy '{name}': backoff_factor must be greater than 1 (got {factor})")]
    BackoffFactor { name: String, factor: f64 },

    #[error("retry policy '{name}': base_delay_ms ({base}) exceeds max_delay_ms ({max})")]
    DelayOrder { name: String, base: u64, max: u64 },

    #[error("duplicate {section} name '{name}'")]
    Duplicate { section: &'static str, name: String },

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
}

/// Check `config` and collect every problem found.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for breaker in &config.breakers {
        if !seen.insert(breaker.name.as_str()) {
            errors.push(ValidationError::Duplicate {
                section: "breaker",
                name: breaker.name.clone(),
            });
        }
        check_breaker(&breaker.name, &breaker.settings, &mut errors);
    }

    let mut seen = HashSet::new();
    for policy in &config.retry_policies {
        if !seen.insert(policy.name.as_str()) {
            errors.push(ValidationError::Duplicate {
                section: "retry policy",
                name: policy.name.clone(),
            });
        }
        check_retry(&policy.name, &policy.settings, &mut errors);
    }

    let mut seen = HashSet::new();
    for endpoint in &config.endpoints {
        if !seen.insert(endpoint.id.as_str()) {
            errors.push(ValidationError::Duplicate {
                section: "endpoint",
                name: endpoint.id.clone(),
            });
        }
    }

    if config.selector.circuit_breaker_threshold == 0 {
        errors.push(ValidationError::ZeroValue {
            section: "selector",
            name: "selector".to_string(),
            field: "circuit_breaker_threshold",
        });
    }
    if config.selector.rate_window_secs == 0 {
        errors.push(ValidationError::ZeroValue {
            section: "selector",
            name: "selector".to_string(),
            field: "rate_window_secs",
        });
    }

    if config.observability.max_alerts == 0 {
        errors.push(ValidationError::ZeroValue {
            section: "observability",
            name: "observability".to_string(),
            field: "max_alerts",
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_breaker(name: &str, config: &CircuitBreakerConfig, errors: &mut Vec<ValidationError>) {
    for (field, value) in [
        ("failure_threshold", config.failure_threshold),
        ("success_threshold", config.success_threshold),
        ("half_open_max_calls", config.half_open_max_calls),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroValue {
                section: "breaker",
                name: name.to_string(),
                field,
            });
        }
    }

    if config.success_threshold > config.half_open_max_calls {
        errors.push(ValidationError::UnreachableClose {
            name: name.to_string(),
            success: config.success_threshold,
            max_calls: config.half_open_max_calls,
        });
    }
}

fn check_retry(name: &str, config: &RetryPolicyConfig, errors: &mut Vec<ValidationError>) {
    if config.max_attempts == 0 {
        errors.push(ValidationError::ZeroValue {
            section: "retry policy",
            name: name.to_string(),
            field: "max_attempts",
        });
    }
    if !(config.backoff_factor > 1.0) {
        errors.push(ValidationError::BackoffFactor {
            name: name.to_string(),
            factor: config.backoff_factor,
        });
    }
    if config.base_delay_ms > config.max_delay_ms {
        errors.push(ValidationError::DelayOrder {
            name: name.to_string(),
            base: config.base_delay_ms,
            max: config.max_delay_ms,
        });
    }
}
