//! Recovery subsystem.
//!
//! # Data Flow
//! ```text
//! execute_with_protection(operation, breaker?, retry_policy?)
//!     → manager.rs builds a resilience::Protection chain from named registries
//!     → outcome folded into global ErrorMetrics
//!     → terminal failure appended to alerts.rs
//!
//! attempt_recovery(error, context)
//!     → strategy.rs lookup by error kind
//!     → strategy outcome (Err and panics count as failure)
//!     → recovery counters + alerts.rs
//!
//! get_system_health()
//!     → report.rs snapshot of every breaker and global counters
//! ```
//!
//! # Design Decisions
//! - Registries are keyed by name; re-registering a name replaces the entry
//! - Recovery never propagates strategy failures
//! - Health reporting reads through poison-tolerant locks and never fails

pub mod alerts;
pub mod manager;
pub mod report;
pub mod strategy;

pub use alerts::{AlertLog, AlertRecord};
pub use manager::RecoveryManager;
pub use report::SystemHealth;
pub use strategy::{strategy_fn, FnStrategy, RecoveryStrategy, WaitAndRecover};
