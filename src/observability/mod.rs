//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! api/ (per request) and resilience/ (limiter, breakers) produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (JSON or pretty)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metric updates go through the `metrics` facade and are no-ops until an
//!   exporter is installed, so tests need no setup
//! - Error causes are logged, never rendered into responses

pub mod logging;
pub mod metrics;
