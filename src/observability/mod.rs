//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Transport and server produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters and histograms via the `metrics` facade)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG or config)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Recording metrics without an installed recorder is a no-op, so the
//!   transport records unconditionally
//! - Backend addresses stay out of metric labels; they churn with the pool

pub mod logging;
pub mod metrics;
