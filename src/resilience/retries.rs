//! Retry logic.
//!
//! # Responsibilities
//! - Decide whether a failed attempt is worth repeating ([`RetryPredicate`])
//! - Run an async operation up to `max_retries + 1` times
//! - Sleep with exponential backoff between attempts, never after the last one
//!
//! The loop is generic over the error type; HTTP classification lives in
//! `crate::http::error`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::clock::{Sleeper, TokioSleeper};

/// Strategy deciding whether an error is transient.
pub trait RetryPredicate<E>: Send + Sync {
    fn should_retry(&self, error: &E) -> bool;
}

impl<E, F> RetryPredicate<E> for F
where
    F: Fn(&E) -> bool + Send + Sync,
{
    fn should_retry(&self, error: &E) -> bool {
        self(error)
    }
}

/// A retry configuration bound to a predicate and a sleeper.
pub struct RetryPolicy<E> {
    config: RetryConfig,
    predicate: Arc<dyn RetryPredicate<E>>,
    sleeper: Arc<dyn Sleeper>,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            predicate: self.predicate.clone(),
            sleeper: self.sleeper.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .field("predicate", &"<predicate>")
            .field("sleeper", &"<sleeper>")
            .finish()
    }
}

impl<E> RetryPolicy<E>
where
    E: fmt::Display,
{
    pub fn new(config: RetryConfig, predicate: impl RetryPredicate<E> + 'static) -> Self {
        Self::from_parts(config, Arc::new(predicate), Arc::new(TokioSleeper))
    }

    pub fn from_parts(
        config: RetryConfig,
        predicate: Arc<dyn RetryPredicate<E>>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            config,
            predicate,
            sleeper,
        }
    }

    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Delay inserted after failed attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff(&self.config, attempt)
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out.
    ///
    /// Returns the first success or the last observed error.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.config.max_attempts();
        let mut attempt = 0u32;

        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let attempts_remain = attempt + 1 < max_attempts;
            if !attempts_remain {
                if max_attempts > 1 {
                    tracing::warn!(attempts = max_attempts, error = %err, "Retries exhausted");
                }
                return Err(err);
            }
            if !self.predicate.should_retry(&err) {
                tracing::debug!(attempt = attempt + 1, error = %err, "Error is not retryable");
                return Err(err);
            }

            let delay = self.delay_for(attempt);
            tracing::info!(
                attempt = attempt + 1,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying after transient failure"
            );
            metrics::record_retry();
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}
