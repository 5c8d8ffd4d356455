//! Endpoint health scoring.

use tokio::time::Instant;

use crate::selection::endpoint::{EndpointMetrics, EndpointStatus};

/// Largest penalty for consecutive failures.
const MAX_FAILURE_PENALTY: f64 = 0.5;
const FAILURE_PENALTY_STEP: f64 = 0.1;
/// Bonus for a success right now, decaying linearly to 0 over an hour.
const RECENCY_BONUS: f64 = 0.2;
const RECENCY_HORIZON_SECS: f64 = 3600.0;
/// Latency above this many seconds is penalized.
const SLOW_THRESHOLD_SECS: f64 = 2.0;
const SPEED_PENALTY_STEP: f64 = 0.1;
const MAX_SPEED_PENALTY: f64 = 0.3;

/// Health score in `[0.0, 1.0]`; exactly 0.0 for unavailable endpoints.
pub fn health_score(status: EndpointStatus, metrics: &EndpointMetrics, now: Instant) -> f64 {
    if status == EndpointStatus::Unavailable {
        return 0.0;
    }

    let success_rate = 1.0 - metrics.error_rate();
    let failure_penalty =
        MAX_FAILURE_PENALTY.min(f64::from(metrics.consecutive_failures) * FAILURE_PENALTY_STEP);

    let recency_bonus = metrics.last_success.map_or(0.0, |at| {
        let since = now.saturating_duration_since(at).as_secs_f64();
        (RECENCY_BONUS * (1.0 - since / RECENCY_HORIZON_SECS)).max(0.0)
    });

    let speed_penalty = MAX_SPEED_PENALTY
        .min(((metrics.average_response_time - SLOW_THRESHOLD_SECS) * SPEED_PENALTY_STEP).max(0.0));

    (success_rate - failure_penalty + recency_bonus - speed_penalty).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn metrics(total: u64, failed: u64, consecutive: u32, avg: f64) -> EndpointMetrics {
        EndpointMetrics {
            total_requests: total,
            successful_requests: total - failed,
            failed_requests: failed,
            average_response_time: avg,
            latency_samples: total - failed,
            consecutive_failures: consecutive,
            last_success: None,
            last_failure: None,
        }
    }

    #[test]
    fn test_reference_score() {
        let m = metrics(10, 2, 0, 1.0);
        assert_eq!(health_score(EndpointStatus::Available, &m, Instant::now()), 0.8);
    }

    #[test]
    fn test_unavailable_scores_zero() {
        let m = metrics(10, 0, 0, 0.5);
        assert_eq!(health_score(EndpointStatus::Unavailable, &m, Instant::now()), 0.0);
    }

    #[test]
    fn test_fresh_endpoint_scores_one() {
        assert_eq!(
            health_score(EndpointStatus::Available, &EndpointMetrics::default(), Instant::now()),
            1.0
        );
    }

    #[test]
    fn test_non_increasing_in_consecutive_failures() {
        let now = Instant::now();
        let mut previous = f64::MAX;
        for consecutive in 0..12 {
            let m = metrics(20, 8, consecutive, 2.5);
            let score = health_score(EndpointStatus::Available, &m, now);
            assert!(score <= previous, "score rose at {consecutive}");
            assert!((0.0..=1.0).contains(&score));
            previous = score;
        }
    }

    #[test]
    fn test_speed_penalty_capped() {
        let now = Instant::now();
        let slow = metrics(10, 0, 0, 3.0);
        let glacial = metrics(10, 0, 0, 30.0);
        assert!((health_score(EndpointStatus::Available, &slow, now) - 0.9).abs() < 1e-9);
        assert!((health_score(EndpointStatus::Available, &glacial, now) - 0.7).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recency_bonus_decays() {
        let mut m = metrics(10, 5, 0, 1.0);
        m.last_success = Some(Instant::now());

        let fresh = health_score(EndpointStatus::Available, &m, Instant::now());
        assert!((fresh - 0.7).abs() < 1e-9);

        tokio::time::advance(Duration::from_secs(1800)).await;
        let half = health_score(EndpointStatus::Available, &m, Instant::now());
        assert!((half - 0.6).abs() < 1e-9);

        tokio::time::advance(Duration::from_secs(3600)).await;
        let stale = health_score(EndpointStatus::Available, &m, Instant::now());
        assert!((stale - 0.5).abs() < 1e-9);
    }
}
