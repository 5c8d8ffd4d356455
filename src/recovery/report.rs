//! System health report.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::resilience::circuit_breaker::{BreakerStatus, CircuitState};
use crate::resilience::classify::ErrorMetrics;

/// Serializable snapshot of every registered breaker plus global counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemHealth {
    pub total_errors: u64,
    pub consecutive_errors: u64,
    pub error_metrics: ErrorMetrics,
    pub circuit_breakers_total: usize,
    pub circuit_breakers_open: usize,
    pub circuit_breakers_half_open: usize,
    pub circuit_breakers_closed: usize,
    pub circuit_breaker_details: BTreeMap<String, BreakerStatus>,
    pub recovery_attempts: u64,
    pub recovery_successes: u64,
    pub alert_count: usize,
}

impl SystemHealth {
    /// Tally breaker states from `details`.
    pub(crate) fn with_breakers(mut self, details: BTreeMap<String, BreakerStatus>) -> Self {
        self.circuit_breakers_total = details.len();
        for status in details.values() {
            match status.state {
                CircuitState::Open => self.circuit_breakers_open += 1,
                CircuitState::HalfOpen => self.circuit_breakers_half_open += 1,
                CircuitState::Closed => self.circuit_breakers_closed += 1,
            }
        }
        self.circuit_breaker_details = details;
        self
    }

    pub fn is_degraded(&self) -> bool {
        self.circuit_breakers_open > 0 || self.circuit_breakers_half_open > 0
    }
}
