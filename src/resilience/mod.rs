//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Protected call:
//!     → pipeline.rs (caller-built chain)
//!     → retries.rs (outermost: attempt budget, backoff.rs delays, timeouts.rs cancellation)
//!     → circuit_breaker.rs (innermost: gate, record outcome, classify.rs error metrics)
//!     → operation
//! ```
//!
//! # Design Decisions
//! - One breaker per protected resource name; breakers never share locks
//! - Breakers fail fast while open and are never retried by themselves
//! - Retries treat every failure alike; kind-specific handling is left to
//!   recovery strategies
//! - Terminal failures are always propagated, never swallowed

pub mod backoff;
pub mod circuit_breaker;
pub mod classify;
pub mod error;
pub mod pipeline;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerStatus, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use error::{BoxError, ErrorKind, GuardError, GuardResult, OperationError, RejectReason, Severity};
pub use pipeline::Protection;
pub use retries::{RetryPolicy, RetryPolicyConfig};
pub use timeouts::Cancel;
