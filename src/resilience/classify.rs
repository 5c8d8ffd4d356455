//! Per-breaker error accounting.

use std::collections::BTreeMap;

use serde::Serialize;
use tokio::time::Instant;

use crate::resilience::error::{ErrorKind, Severity};

/// Rolling error counters, reported in system health.
///
/// Counts are keyed by the string tag of the kind and severity so the
/// report serializes as plain JSON objects.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ErrorMetrics {
    pub total_errors: u64,
    pub errors_by_kind: BTreeMap<String, u64>,
    pub errors_by_severity: BTreeMap<String, u64>,
    pub consecutive_errors: u64,
    pub successful_calls: u64,
    /// Seconds since the last recorded error, filled in when reported.
    pub seconds_since_last_error: Option<f64>,
    #[serde(skip)]
    last_error: Option<Instant>,
}

impl ErrorMetrics {
    pub fn record_error(&mut self, kind: &ErrorKind, severity: Severity) {
        self.total_errors += 1;
        *self.errors_by_kind.entry(kind.as_str().to_string()).or_insert(0) += 1;
        *self.errors_by_severity.entry(severity.as_str().to_string()).or_insert(0) += 1;
        self.consecutive_errors += 1;
        self.last_error = Some(Instant::now());
    }

    pub fn record_success(&mut self) {
        self.consecutive_errors = 0;
        self.successful_calls += 1;
    }

    pub fn last_error(&self) -> Option<Instant> {
        self.last_error
    }

    /// Clone with `seconds_since_last_error` resolved against `now`.
    pub fn snapshot(&self, now: Instant) -> Self {
        let mut snapshot = self.clone();
        snapshot.seconds_since_last_error = self
            .last_error
            .map(|at| now.saturating_duration_since(at).as_secs_f64());
        snapshot
    }
}
