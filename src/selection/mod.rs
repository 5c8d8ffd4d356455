//! Endpoint selection subsystem.
//!
//! # Data Flow
//! ```text
//! Before a call:
//!     → selector.rs (select_best / rotate over available endpoints)
//!         → score.rs (health score from endpoint.rs metrics)
//!     → rate_limit.rs (advisory per-minute window check)
//!
//! After a call (or a health probe):
//!     → selector.rs record_outcome
//!         → endpoint.rs metrics update
//!         → coarse gate: consecutive failures → Unavailable
//! ```
//!
//! # Design Decisions
//! - Selection reads a snapshot; it is not linearized with concurrent outcomes
//! - Only `Available` endpoints are selectable
//! - Metrics are per-endpoint, each behind its own lock

pub mod endpoint;
pub mod rate_limit;
pub mod score;
pub mod selector;

pub use endpoint::{Endpoint, EndpointMetrics, EndpointStatus};
pub use rate_limit::RateLimiter;
pub use score::health_score;
pub use selector::{EndpointStats, Selector};
