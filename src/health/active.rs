//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe endpoints
//! - Feed probe outcomes into the selector like ordinary call outcomes
//! - Give unavailable endpoints a way back once their cooldown has passed

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::schema::HealthCheckConfig;
use crate::health::probe::{EndpointProbe, ProbeError};
use crate::observability::metrics;
use crate::selection::endpoint::{Endpoint, EndpointStatus};
use crate::selection::selector::Selector;

pub struct HealthMonitor {
    selector: Arc<Selector>,
    config: HealthCheckConfig,
    probe: Arc<dyn EndpointProbe>,
}

impl HealthMonitor {
    pub fn new(selector: Arc<Selector>, config: HealthCheckConfig, probe: Arc<dyn EndpointProbe>) -> Self {
        Self {
            selector,
            config,
            probe,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            timeout = self.config.timeout_secs,
            "Health monitor starting"
        );

        let interval = Duration::from_secs(self.config.interval_secs.max(1));
        let mut ticker = time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every eligible endpoint once. Returns how many were probed.
    pub async fn check_all(&self) -> usize {
        let now = Instant::now();
        let mut probed = 0;

        for endpoint in self.selector.endpoints() {
            let prior = endpoint.status();
            if !self.is_due(&endpoint, prior, now) {
                continue;
            }
            if self.check_one(&endpoint, prior).await {
                probed += 1;
            }
        }

        probed
    }

    fn is_due(&self, endpoint: &Endpoint, status: EndpointStatus, now: Instant) -> bool {
        match status {
            EndpointStatus::Available | EndpointStatus::Error => true,
            // The rate limiter clears RateLimited once its window has room.
            EndpointStatus::RateLimited | EndpointStatus::Testing => false,
            EndpointStatus::Unavailable => {
                let cooldown = Duration::from_secs(self.config.unavailable_cooldown_secs);
                endpoint
                    .metrics()
                    .last_failure
                    .map_or(true, |at| now.saturating_duration_since(at) >= cooldown)
            }
        }
    }

    /// Returns false without probing when the status moved off `prior`.
    /// Status writes after the probe only apply while still `Testing`, so a
    /// concurrent change made by a caller is kept.
    async fn check_one(&self, endpoint: &Endpoint, prior: EndpointStatus) -> bool {
        let id = endpoint.id();
        let timeout = Duration::from_secs(self.config.timeout_secs);

        if !endpoint.transition_status(prior, EndpointStatus::Testing) {
            tracing::debug!(endpoint = %id, prior = ?prior, "Status changed before health probe, skipped");
            return false;
        }
        let started = Instant::now();
        let outcome = match time::timeout(timeout, self.probe.probe(endpoint)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(timeout)),
        };

        match outcome {
            Ok(()) => {
                self.selector.record_outcome(id, true, Some(started.elapsed()));
                tracing::debug!(endpoint = %id, prior = ?prior, "Health probe passed");
                metrics::record_probe(id, true);
            }
            Err(ProbeError::NoTarget(_)) => {
                endpoint.transition_status(EndpointStatus::Testing, prior);
                tracing::debug!(endpoint = %id, "No health probe target");
            }
            Err(error) => {
                let after = self.selector.record_outcome(id, false, None);
                if after != Some(EndpointStatus::Unavailable) {
                    let status = match error {
                        ProbeError::RateLimited => EndpointStatus::RateLimited,
                        _ => EndpointStatus::Error,
                    };
                    endpoint.transition_status(EndpointStatus::Testing, status);
                }
                tracing::warn!(endpoint = %id, error = %error, status = ?endpoint.status(), "Health probe failed");
                metrics::record_probe(id, false);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Answers from a per-endpoint script; unscripted ids have no target.
    #[derive(Default)]
    struct ScriptedCheck {
        answers: Mutex<HashMap<String, Vec<Result<(), ProbeError>>>>,
        hang: bool,
        /// Status a concurrent caller writes while the check is in flight.
        interject: Option<EndpointStatus>,
    }

    impl ScriptedCheck {
        fn answer(self, id: &str, result: Result<(), ProbeError>) -> Self {
            self.answers.lock().unwrap().entry(id.to_string()).or_default().push(result);
            self
        }

        fn interject(mut self, status: EndpointStatus) -> Self {
            self.interject = Some(status);
            self
        }
    }

    #[async_trait]
    impl EndpointProbe for ScriptedCheck {
        async fn probe(&self, endpoint: &Endpoint) -> Result<(), ProbeError> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            if let Some(status) = self.interject {
                endpoint.set_status(status);
            }
            let mut answers = self.answers.lock().unwrap();
            match answers.get_mut(endpoint.id()) {
                Some(script) if !script.is_empty() => script.remove(0),
                _ => Err(ProbeError::NoTarget(endpoint.id().to_string())),
            }
        }
    }

    fn config() -> HealthCheckConfig {
        HealthCheckConfig {
            enabled: true,
            interval_secs: 10,
            timeout_secs: 2,
            unavailable_cooldown_secs: 60,
        }
    }

    fn selector(ids: &[&str]) -> Arc<Selector> {
        let selector = Arc::new(Selector::new(2));
        for id in ids {
            selector.register(Endpoint::new(*id, ""));
        }
        selector
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_outcomes_set_status() {
        let selector = selector(&["ok", "limited", "broken"]);
        // "limited" starts available and is answered with a 429.
        let probe = ScriptedCheck::default()
            .answer("ok", Ok(()))
            .answer("limited", Err(ProbeError::RateLimited))
            .answer("broken", Err(ProbeError::Status(500)));
        let monitor = HealthMonitor::new(selector.clone(), config(), Arc::new(probe));

        assert_eq!(monitor.check_all().await, 3);
        assert_eq!(selector.get("ok").unwrap().status(), EndpointStatus::Available);
        assert_eq!(selector.get("limited").unwrap().status(), EndpointStatus::RateLimited);
        assert_eq!(selector.get("broken").unwrap().status(), EndpointStatus::Error);
        assert_eq!(selector.get("ok").unwrap().metrics().successful_requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_target_restores_status() {
        let selector = selector(&["a"]);
        selector.get("a").unwrap().set_status(EndpointStatus::Error);
        let monitor = HealthMonitor::new(selector.clone(), config(), Arc::new(ScriptedCheck::default()));

        monitor.check_all().await;
        let a = selector.get("a").unwrap();
        assert_eq!(a.status(), EndpointStatus::Error);
        assert_eq!(a.metrics().total_requests, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_reprobed_after_cooldown() {
        let selector = selector(&["a"]);
        selector.record_outcome("a", false, None);
        selector.record_outcome("a", false, None);
        assert_eq!(selector.get("a").unwrap().status(), EndpointStatus::Unavailable);

        let probe = ScriptedCheck::default().answer("a", Ok(()));
        let monitor = HealthMonitor::new(selector.clone(), config(), Arc::new(probe));

        assert_eq!(monitor.check_all().await, 0);
        assert_eq!(selector.get("a").unwrap().status(), EndpointStatus::Unavailable);

        time::advance(Duration::from_secs(60)).await;
        assert_eq!(monitor.check_all().await, 1);
        assert_eq!(selector.get("a").unwrap().status(), EndpointStatus::Available);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reprobe_stays_unavailable() {
        let selector = selector(&["a"]);
        selector.record_outcome("a", false, None);
        selector.record_outcome("a", false, None);

        let probe = ScriptedCheck::default().answer("a", Err(ProbeError::Request("refused".into())));
        let monitor = HealthMonitor::new(selector.clone(), config(), Arc::new(probe));

        time::advance(Duration::from_secs(61)).await;
        monitor.check_all().await;
        assert_eq!(selector.get("a").unwrap().status(), EndpointStatus::Unavailable);
        assert_eq!(selector.get("a").unwrap().metrics().consecutive_failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_timeout_counts_as_failure() {
        let selector = selector(&["a"]);
        let probe = ScriptedCheck {
            hang: true,
            ..Default::default()
        };
        let monitor = HealthMonitor::new(selector.clone(), config(), Arc::new(probe));

        monitor.check_all().await;
        let a = selector.get("a").unwrap();
        assert_eq!(a.status(), EndpointStatus::Error);
        assert_eq!(a.metrics().failed_requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_endpoint_not_checked() {
        let selector = selector(&["a"]);
        let a = selector.get("a").unwrap();
        a.set_status(EndpointStatus::RateLimited);
        let script = ScriptedCheck::default().answer("a", Ok(()));
        let monitor = HealthMonitor::new(selector.clone(), config(), Arc::new(script));

        assert_eq!(monitor.check_all().await, 0);
        assert_eq!(a.status(), EndpointStatus::RateLimited);
        assert_eq!(a.metrics().total_requests, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_prior_status_skips_check() {
        let selector = selector(&["a"]);
        let a = selector.get("a").unwrap();
        let script = ScriptedCheck::default().answer("a", Err(ProbeError::Status(500)));
        let monitor = HealthMonitor::new(selector.clone(), config(), Arc::new(script));

        assert!(!monitor.check_one(&a, EndpointStatus::Error).await);
        assert_eq!(a.status(), EndpointStatus::Available);
        assert_eq!(a.metrics().total_requests, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_written_during_check_is_kept() {
        let selector = selector(&["missing", "failing"]);
        selector.get("missing").unwrap().set_status(EndpointStatus::Error);
        let script = ScriptedCheck::default()
            .answer("failing", Err(ProbeError::Status(500)))
            .interject(EndpointStatus::Available);
        let monitor = HealthMonitor::new(selector.clone(), config(), Arc::new(script));

        assert_eq!(monitor.check_all().await, 2);

        // No target: not rolled back to the prior Error.
        assert_eq!(selector.get("missing").unwrap().status(), EndpointStatus::Available);

        // Below the threshold, and the mid-check Available is not replaced by Error.
        let failing = selector.get("failing").unwrap();
        assert_eq!(failing.status(), EndpointStatus::Available);
        assert_eq!(failing.metrics().consecutive_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let selector = selector(&["a"]);
        let probe = ScriptedCheck::default().answer("a", Ok(()));
        let monitor = HealthMonitor::new(selector.clone(), config(), Arc::new(probe));

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(monitor.run(shutdown.clone()));
        time::sleep(Duration::from_secs(1)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(selector.get("a").unwrap().metrics().successful_requests, 1);
    }
}
