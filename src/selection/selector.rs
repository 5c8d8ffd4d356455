//! Endpoint registry and health-based selection.
//!
//! # Responsibilities
//! - Own the set of known endpoints, keyed by id, in first-seen order
//! - Pick the healthiest available endpoint, honouring an exclusion set
//! - Fold call outcomes into endpoint metrics
//! - Apply the coarse gate: `consecutive_failures >= threshold` makes an
//!   endpoint unavailable
//!
//! The coarse gate is independent of any [`CircuitBreaker`]; it protects the
//! selectable set rather than the call path.
//!
//! [`CircuitBreaker`]: crate::resilience::CircuitBreaker

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::schema::GuardConfig;
use crate::observability::metrics;
use crate::selection::endpoint::{Endpoint, EndpointStatus};
use crate::selection::rate_limit::RateLimiter;
use crate::selection::score::health_score;

/// Serializable per-endpoint statistics.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointStats {
    pub id: String,
    pub description: String,
    pub status: EndpointStatus,
    pub health_score: f64,
    pub total_requests: u64,
    pub success_rate: f64,
    pub average_response_time: f64,
    pub consecutive_failures: u32,
}

#[derive(Debug, Default)]
struct Registry {
    ordered: Vec<Arc<Endpoint>>,
    by_id: HashMap<String, usize>,
}

/// Health-scored endpoint selector.
#[derive(Debug)]
pub struct Selector {
    registry: RwLock<Registry>,
    circuit_breaker_threshold: u32,
    rate_limiter: RateLimiter,
}

impl Selector {
    pub fn new(circuit_breaker_threshold: u32) -> Self {
        Self::with_rate_limiter(circuit_breaker_threshold, RateLimiter::new())
    }

    pub fn with_rate_limiter(circuit_breaker_threshold: u32, rate_limiter: RateLimiter) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            circuit_breaker_threshold,
            rate_limiter,
        }
    }

    /// Build a selector and register every configured endpoint.
    pub fn from_config(config: &GuardConfig) -> Self {
        let selector = Self::with_rate_limiter(
            config.selector.circuit_breaker_threshold,
            RateLimiter::with_window(Duration::from_secs(config.selector.rate_window_secs)),
        );
        for endpoint in &config.endpoints {
            selector.register(Endpoint::from_config(endpoint));
        }
        selector
    }

    pub fn circuit_breaker_threshold(&self) -> u32 {
        self.circuit_breaker_threshold
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Register an endpoint. An already-known id keeps its existing entry.
    pub fn register(&self, endpoint: Endpoint) -> Arc<Endpoint> {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(&index) = registry.by_id.get(endpoint.id()) {
            tracing::debug!(endpoint = %endpoint.id(), "Endpoint already registered");
            return registry.ordered[index].clone();
        }

        let endpoint = Arc::new(endpoint);
        let index = registry.ordered.len();
        registry.by_id.insert(endpoint.id().to_string(), index);
        registry.ordered.push(endpoint.clone());
        tracing::info!(endpoint = %endpoint.id(), rate_limit_rpm = ?endpoint.rate_limit_rpm(), "Endpoint registered");
        endpoint
    }

    pub fn get(&self, id: &str) -> Option<Arc<Endpoint>> {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry.by_id.get(id).map(|&index| registry.ordered[index].clone())
    }

    /// Snapshot of all endpoints in first-seen order.
    pub fn endpoints(&self) -> Vec<Arc<Endpoint>> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ordered
            .clone()
    }

    pub fn len(&self) -> usize {
        self.registry.read().unwrap_or_else(PoisonError::into_inner).ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest-scoring available endpoint not in `exclude`.
    /// Ties go to the endpoint registered first.
    pub fn select_best(&self, exclude: &HashSet<String>) -> Option<Arc<Endpoint>> {
        let now = Instant::now();
        let mut best: Option<(f64, Arc<Endpoint>)> = None;

        for endpoint in self.endpoints() {
            let status = endpoint.status();
            if status != EndpointStatus::Available || exclude.contains(endpoint.id()) {
                continue;
            }
            let score = health_score(status, &endpoint.metrics(), now);
            if best.as_ref().map_or(true, |(top, _)| score > *top) {
                best = Some((score, endpoint));
            }
        }

        match best {
            Some((score, endpoint)) => {
                tracing::debug!(endpoint = %endpoint.id(), score, "Selected endpoint");
                Some(endpoint)
            }
            None => {
                tracing::warn!(excluded = exclude.len(), "No available endpoints");
                None
            }
        }
    }

    /// Best endpoint other than `current_id`.
    pub fn rotate(&self, current_id: &str) -> Option<Arc<Endpoint>> {
        tracing::info!(from = %current_id, "Rotating endpoint");
        let exclude = HashSet::from([current_id.to_string()]);
        self.select_best(&exclude)
    }

    /// Record a call outcome. Returns the endpoint's resulting status, or
    /// `None` for an unknown id.
    ///
    /// A success makes the endpoint available again. A failure that brings
    /// `consecutive_failures` to the threshold makes it unavailable.
    pub fn record_outcome(&self, id: &str, success: bool, response_time: Option<Duration>) -> Option<EndpointStatus> {
        let Some(endpoint) = self.get(id) else {
            tracing::debug!(endpoint = %id, "Outcome for unknown endpoint ignored");
            return None;
        };
        let now = Instant::now();

        // Status is decided while the metrics lock is held, so it always
        // agrees with the counters that produced it.
        if success {
            let recovered = endpoint.update_metrics(|m| {
                m.record_success(response_time, now);
                let recovered = endpoint.status() != EndpointStatus::Available;
                endpoint.set_status(EndpointStatus::Available);
                recovered
            });
            if recovered {
                tracing::info!(endpoint = %id, "Endpoint available");
            }
        } else {
            let (consecutive, tripped) = endpoint.update_metrics(|m| {
                m.record_failure(now);
                let tripped = m.consecutive_failures >= self.circuit_breaker_threshold
                    && endpoint.status() != EndpointStatus::Unavailable;
                if tripped {
                    endpoint.set_status(EndpointStatus::Unavailable);
                }
                (m.consecutive_failures, tripped)
            });
            if tripped {
                tracing::warn!(
                    endpoint = %id,
                    consecutive_failures = consecutive,
                    "Endpoint marked unavailable"
                );
            }
        }

        metrics::record_health_score(id, endpoint.health_score());
        Some(endpoint.status())
    }

    /// Advisory rate-limit check for a known endpoint. Unknown ids pass.
    pub fn check_rate_limit(&self, id: &str) -> bool {
        match self.get(id) {
            Some(endpoint) => self.rate_limiter.check(&endpoint),
            None => true,
        }
    }

    /// Statistics for every endpoint, in first-seen order.
    pub fn stats(&self) -> Vec<EndpointStats> {
        let now = Instant::now();
        self.endpoints()
            .iter()
            .map(|endpoint| {
                let status = endpoint.status();
                let m = endpoint.metrics();
                EndpointStats {
                    id: endpoint.id().to_string(),
                    description: endpoint.description().to_string(),
                    status,
                    health_score: health_score(status, &m, now),
                    total_requests: m.total_requests,
                    success_rate: 1.0 - m.error_rate(),
                    average_response_time: m.average_response_time,
                    consecutive_failures: m.consecutive_failures,
                }
            })
            .collect()
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::new(crate::config::schema::SelectorConfig::default().circuit_breaker_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector_with(ids: &[&str]) -> Selector {
        let selector = Selector::new(3);
        for id in ids {
            selector.register(Endpoint::new(*id, format!("model {id}")));
        }
        selector
    }

    #[test]
    fn test_ties_go_to_first_seen() {
        let selector = selector_with(&["a", "b", "c"]);
        let best = selector.select_best(&HashSet::new()).unwrap();
        assert_eq!(best.id(), "a");
    }

    #[test]
    fn test_picks_highest_score() {
        let selector = selector_with(&["a", "b"]);
        selector.record_outcome("a", true, Some(Duration::from_millis(500)));
        selector.record_outcome("a", false, None);
        selector.record_outcome("b", true, Some(Duration::from_millis(500)));

        assert_eq!(selector.select_best(&HashSet::new()).unwrap().id(), "b");
    }

    #[test]
    fn test_exclusion_and_rotation() {
        let selector = selector_with(&["a", "b"]);
        let exclude = HashSet::from(["a".to_string()]);
        assert_eq!(selector.select_best(&exclude).unwrap().id(), "b");
        assert_eq!(selector.rotate("b").unwrap().id(), "a");

        let all = HashSet::from(["a".to_string(), "b".to_string()]);
        assert!(selector.select_best(&all).is_none());
    }

    #[test]
    fn test_non_available_never_selected() {
        let selector = selector_with(&["a", "b", "c", "d"]);
        selector.get("a").unwrap().set_status(EndpointStatus::RateLimited);
        selector.get("b").unwrap().set_status(EndpointStatus::Error);
        selector.get("c").unwrap().set_status(EndpointStatus::Testing);
        assert_eq!(selector.select_best(&HashSet::new()).unwrap().id(), "d");

        selector.get("d").unwrap().set_status(EndpointStatus::Unavailable);
        assert!(selector.select_best(&HashSet::new()).is_none());
    }

    #[test]
    fn test_coarse_gate_marks_unavailable() {
        let selector = selector_with(&["a", "b"]);
        assert_eq!(selector.record_outcome("a", false, None), Some(EndpointStatus::Available));
        assert_eq!(selector.record_outcome("a", false, None), Some(EndpointStatus::Available));
        assert_eq!(selector.record_outcome("a", false, None), Some(EndpointStatus::Unavailable));

        let a = selector.get("a").unwrap();
        assert_eq!(a.health_score(), 0.0);
        assert_eq!(selector.select_best(&HashSet::new()).unwrap().id(), "b");

        // A later success (e.g. a health probe) reinstates it.
        assert_eq!(
            selector.record_outcome("a", true, Some(Duration::from_secs(1))),
            Some(EndpointStatus::Available)
        );
        assert_eq!(a.metrics().consecutive_failures, 0);
    }

    #[test]
    fn test_register_keeps_existing_identity() {
        let selector = Selector::new(5);
        let first = selector.register(Endpoint::new("a", "original").with_rate_limit(10));
        let second = selector.register(Endpoint::new("a", "replacement"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(selector.len(), 1);
        assert_eq!(second.description(), "original");
    }

    #[test]
    fn test_unknown_endpoint() {
        let selector = Selector::default();
        assert!(selector.is_empty());
        assert_eq!(selector.record_outcome("ghost", true, None), None);
        assert!(selector.check_rate_limit("ghost"));
    }

    #[test]
    fn test_stats() {
        let selector = selector_with(&["a"]);
        selector.record_outcome("a", true, Some(Duration::from_secs(3)));
        selector.record_outcome("a", false, None);

        let stats = selector.stats();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_requests, 2);
        assert_eq!(stats[0].success_rate, 0.5);
        assert_eq!(stats[0].average_response_time, 3.0);
        assert_eq!(stats[0].consecutive_failures, 1);
        assert_eq!(stats[0].description, "model a");

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json[0]["status"], "available");
    }
}
