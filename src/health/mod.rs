//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe each due endpoint through probe.rs
//!     → Selector::record_outcome (same path as ordinary calls)
//!
//! Passive health checks:
//!     Call outcome reported by the caller
//!     → Selector::record_outcome
//!     → Unavailable once consecutive failures reach the threshold
//! ```
//!
//! # Design Decisions
//! - An endpoint is `Testing` while its probe is in flight
//! - Unavailable endpoints are re-probed only after a cooldown
//! - A passing probe is the way back to `Available`

pub mod active;
pub mod probe;

pub use active::HealthMonitor;
pub use probe::{EndpointProbe, HttpProbe, ProbeError};
