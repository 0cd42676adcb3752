//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! deadline + http subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout log stream
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line of a request
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
