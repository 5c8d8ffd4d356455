//! Resilient invocation layer for calls to unreliable remote endpoints.
//!
//! Callers pick an endpoint through [`Selector`], run the call through a
//! [`RecoveryManager`] (named circuit breakers and retry policies) and report
//! the outcome back to the selector. [`HealthMonitor`] probes endpoints in the
//! background so unavailable ones can return to rotation.

// Core subsystems
pub mod config;
pub mod recovery;
pub mod resilience;
pub mod selection;

// Background work
pub mod health;

// Cross-cutting concerns
pub mod observability;

pub use config::schema::GuardConfig;
pub use health::HealthMonitor;
pub use recovery::RecoveryManager;
pub use resilience::{CircuitBreaker, GuardError, OperationError, RetryPolicy};
pub use selection::Selector;
