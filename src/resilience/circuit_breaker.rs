//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: probing whether the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count reaches failure_threshold (consecutive)
//! Open → Half-Open: reset_timeout elapsed since last failure (checked on the next call)
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails
//! ```
//!
//! Any success clears the failure streak. There is no background timer; the
//! cool-down is evaluated against the injected [`Clock`] when a call arrives.
//! Without `single_trial`, concurrent calls arriving while half-open are all
//! admitted.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::resilience::clock::{Clock, SystemClock};

/// Circuit state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure: Option<Instant>,
}

/// Outcome of a guarded call that did not succeed.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The breaker short-circuited the call; the operation was not invoked.
    #[error("circuit breaker '{breaker}' is open (retry in {retry_after:?})")]
    Open {
        breaker: String,
        retry_after: Duration,
    },

    /// The operation ran and failed.
    #[error("{0}")]
    Inner(E),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    /// The operation's own error, if it ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BreakerError::Inner(e) => Some(e),
            BreakerError::Open { .. } => None,
        }
    }
}

/// True once `reset_timeout` has passed since `last_failure`.
pub fn cooldown_elapsed(now: Instant, last_failure: Option<Instant>, reset_timeout: Duration) -> bool {
    match last_failure {
        Some(at) => now.saturating_duration_since(at) >= reset_timeout,
        None => true,
    }
}

fn remaining_cooldown(now: Instant, last_failure: Option<Instant>, reset_timeout: Duration) -> Duration {
    match last_failure {
        Some(at) => reset_timeout.saturating_sub(now.saturating_duration_since(at)),
        None => Duration::ZERO,
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    /// Set while the single half-open probe is running (`single_trial` only).
    trial_in_flight: bool,
}

/// Guards a family of calls against a failing dependency.
///
/// Share it as `Arc<CircuitBreaker>`; the lock is never held across an await.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let name = name.into();
        metrics::record_breaker_state(&name, CircuitState::Closed);
        Self {
            name,
            config,
            clock,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Stored state. An open breaker whose cool-down has passed still reports
    /// `Open` until the next call moves it to half-open.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            last_failure: inner.last_failure,
        }
    }

    /// Force the breaker closed and forget the failure streak.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.trial_in_flight = false;
        inner.last_failure = None;
        self.transition(&mut inner, CircuitState::Closed);
        inner.failure_count = 0;
    }

    /// Run `operation` unless the circuit is open.
    ///
    /// The operation's error is passed through as [`BreakerError::Inner`] after
    /// the failure is recorded. The breaker itself never retries.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = match self.acquire() {
            Ok(permit) => permit,
            Err(retry_after) => {
                tracing::debug!(
                    breaker = %self.name,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Circuit open, rejecting call"
                );
                metrics::record_breaker_rejection(&self.name);
                return Err(BreakerError::Open {
                    breaker: self.name.clone(),
                    retry_after,
                });
            }
        };

        match operation().await {
            Ok(value) => {
                permit.succeed();
                Ok(value)
            }
            Err(err) => {
                permit.fail();
                Err(BreakerError::Inner(err))
            }
        }
    }

    /// Admit a call, or return the remaining cool-down.
    fn acquire(&self) -> Result<Permit<'_>, Duration> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(Permit::new(self, false)),
            CircuitState::Open => {
                let now = self.clock.now();
                let reset_timeout = self.config.reset_timeout();
                if !cooldown_elapsed(now, inner.last_failure, reset_timeout) {
                    return Err(remaining_cooldown(now, inner.last_failure, reset_timeout));
                }
                self.transition(&mut inner, CircuitState::HalfOpen);
                inner.trial_in_flight = self.config.single_trial;
                Ok(Permit::new(self, self.config.single_trial))
            }
            CircuitState::HalfOpen => {
                if !self.config.single_trial {
                    return Ok(Permit::new(self, false));
                }
                if inner.trial_in_flight {
                    return Err(Duration::ZERO);
                }
                inner.trial_in_flight = true;
                Ok(Permit::new(self, true))
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        if to == CircuitState::Closed {
            inner.failure_count = 0;
        }

        if to == CircuitState::Open {
            tracing::warn!(
                breaker = %self.name,
                from = %from,
                failures = inner.failure_count,
                "Circuit opened"
            );
        } else {
            tracing::info!(breaker = %self.name, from = %from, to = %to, "Circuit state changed");
        }
        metrics::record_breaker_transition(&self.name, to);
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &snapshot.state)
            .field("failure_count", &snapshot.failure_count)
            .field("failure_threshold", &self.config.failure_threshold)
            .field("reset_timeout_ms", &self.config.reset_timeout_ms)
            .finish()
    }
}

/// Admission ticket for one call.
///
/// Settling it records the outcome. Dropping it unsettled (the call was
/// cancelled) records nothing but frees the half-open trial slot.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    holds_trial: bool,
    settled: bool,
}

impl<'a> Permit<'a> {
    fn new(breaker: &'a CircuitBreaker, holds_trial: bool) -> Self {
        Self {
            breaker,
            holds_trial,
            settled: false,
        }
    }

    fn succeed(mut self) {
        self.settled = true;
        let breaker = self.breaker;
        let mut inner = breaker.lock();
        if self.holds_trial {
            inner.trial_in_flight = false;
        }
        inner.failure_count = 0;
        breaker.transition(&mut inner, CircuitState::Closed);
    }

    fn fail(mut self) {
        self.settled = true;
        let breaker = self.breaker;
        let now = breaker.clock.now();
        let mut inner = breaker.lock();
        if self.holds_trial {
            inner.trial_in_flight = false;
        }
        inner.last_failure = Some(now);

        match inner.state {
            // The streak is already at or above the threshold.
            CircuitState::HalfOpen => breaker.transition(&mut inner, CircuitState::Open),
            CircuitState::Closed => {
                inner.failure_count = inner.failure_count.saturating_add(1);
                if inner.failure_count >= breaker.config.failure_threshold {
                    breaker.transition(&mut inner, CircuitState::Open);
                }
            }
            // A call admitted before the circuit opened; restarts the cool-down.
            CircuitState::Open => {
                inner.failure_count = inner.failure_count.saturating_add(1);
            }
        }
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.holds_trial {
            self.breaker.lock().trial_in_flight = false;
        }
    }
}
