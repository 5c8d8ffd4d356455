//! Sliding-window request limiter per endpoint.
//!
//! The check is advisory: a full window marks the endpoint `RateLimited` and
//! returns false, but callers decide whether to proceed. It never errors.

use std::collections::VecDeque;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::observability::metrics;
use crate::selection::endpoint::{Endpoint, EndpointStatus};

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Per-endpoint windows of request timestamps.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, VecDeque<Instant>>,
    window: Duration,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Prune the endpoint's window, then admit and record the request if the
    /// declared per-window capacity allows it.
    ///
    /// A denied request marks an available endpoint `RateLimited`; an admitted
    /// one returns a `RateLimited` endpoint to `Available`.
    pub fn check(&self, endpoint: &Endpoint) -> bool {
        let now = Instant::now();
        let mut window = self.windows.entry(endpoint.id().to_string()).or_default();

        while window
            .front()
            .is_some_and(|at| now.saturating_duration_since(*at) >= self.window)
        {
            window.pop_front();
        }

        if let Some(capacity) = endpoint.rate_limit_rpm() {
            if window.len() >= capacity as usize {
                if endpoint.transition_status(EndpointStatus::Available, EndpointStatus::RateLimited) {
                    tracing::warn!(
                        endpoint = %endpoint.id(),
                        requests = window.len(),
                        capacity,
                        "Endpoint rate limited"
                    );
                }
                metrics::record_rate_limited(endpoint.id());
                return false;
            }
        }

        window.push_back(now);
        if endpoint.transition_status(EndpointStatus::RateLimited, EndpointStatus::Available) {
            tracing::info!(endpoint = %endpoint.id(), "Endpoint rate limit cleared");
        }
        true
    }

    /// Requests recorded for `endpoint_id` in the current window.
    pub fn in_window(&self, endpoint_id: &str) -> usize {
        let now = Instant::now();
        self.windows
            .get(endpoint_id)
            .map(|window| {
                window
                    .iter()
                    .filter(|at| now.saturating_duration_since(**at) < self.window)
                    .count()
            })
            .unwrap_or(0)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
