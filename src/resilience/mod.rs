//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Guarded call:
//!     → circuit_breaker.rs (fail fast while open, record the outcome)
//!     → retries.rs (repeat transient failures with backoff.rs delays)
//!     → timeouts.rs (deadline per attempt)
//! ```
//!
//! # Design Decisions
//! - Each attempt gets a deadline; a timeout aborts only that attempt
//! - Retries are decided by a pluggable predicate, never by the breaker
//! - Breakers are explicit instances, one per dependency family
//! - Time and sleeping are injected (clock.rs) so state machines are testable

pub mod backoff;
pub mod circuit_breaker;
pub mod clock;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerError, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use clock::{Clock, ManualClock, RecordingSleeper, Sleeper, SystemClock, TokioSleeper};
pub use retries::{RetryPolicy, RetryPredicate};
pub use timeouts::{with_timeout, Elapsed};
