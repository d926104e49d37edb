//! Resilient service client for the workshop management API.
//!
//! # Architecture Overview
//!
//! ```text
//!    Service call (chat, orders, inventory)
//!          │
//!          ▼
//!    ┌──────────────────┐   open: fail fast with CIRCUIT_OPEN
//!    │  CircuitBreaker  │──────────────────────────────────────▶ caller
//!    └────────┬─────────┘
//!             │ closed / half-open
//!             ▼
//!    ┌──────────────────┐   transient failure: backoff, try again
//!    │   HttpExecutor   │◀─────────────┐
//!    │  (RetryPolicy)   │──────────────┘
//!    └────────┬─────────┘
//!             │ one attempt, bounded by a deadline
//!             ▼
//!        reqwest::Client ─────────────▶ Workshop API / AI assistant
//! ```
//!
//! Cross-cutting: `config` (TOML, validation, hot reload) and
//! `observability` (tracing, Prometheus metrics).

pub mod assistant;
pub mod config;
pub mod http;
pub mod observability;
pub mod resilience;

pub use config::ClientConfig;
pub use http::{Endpoint, HttpExecutor, RequestError};
pub use resilience::{BreakerError, CircuitBreaker, CircuitState};
