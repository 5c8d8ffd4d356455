//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breakers, retries, selector, health probes, recovery manager produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stdout log stream
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Every state transition is logged with the resource name as a field
//! - Metric updates are no-ops until the binary installs the exporter

pub mod logging;
pub mod metrics;
