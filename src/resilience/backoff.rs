//! Exponential backoff with jitter.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform samples in `[0.0, 1.0)` used for jitter.
pub trait RandomSource: Send + Sync + fmt::Debug {
    fn next_unit(&self) -> f64;
}

/// Thread-local RNG. The default source.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_unit(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Deterministic RNG for reproducible schedules.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_unit(&self) -> f64 {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen::<f64>()
    }
}

/// Delay applied after failed attempt `attempt` (1-indexed):
/// `min(base * factor^(attempt - 1), max)`.
pub fn calculate_backoff(attempt: u32, base: Duration, factor: f64, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    let delay_secs = base.as_secs_f64() * factor.powi(exponent);
    if !delay_secs.is_finite() || delay_secs >= max.as_secs_f64() {
        return max;
    }
    Duration::from_secs_f64(delay_secs.max(0.0))
}

/// Scale `delay` by a factor in `[0.5, 1.0]` derived from `unit`.
pub fn apply_jitter(delay: Duration, unit: f64) -> Duration {
    delay.mul_f64(0.5 + unit.clamp(0.0, 1.0) * 0.5)
}
