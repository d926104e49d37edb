//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Executor, breaker, config watcher produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! Every logical request carries an `x-request-id` that is repeated on each
//! retry, so attempts can be correlated in logs and on the server side.

pub mod logging;
pub mod metrics;
