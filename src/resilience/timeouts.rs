//! Timeout enforcement.
//!
//! Each attempt runs under its own deadline. When the deadline passes, the
//! inner future is dropped, which aborts the in-flight request. Retries are
//! scheduled by the caller and are not affected.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// An attempt exceeded its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation timed out after {0:?}")]
pub struct Elapsed(pub Duration);

/// Run `future` with a deadline of `limit`.
pub async fn with_timeout<F, T>(limit: Duration, future: F) -> Result<T, Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| Elapsed(limit))
}

/// Per-call override if present, otherwise the configured default.
pub fn effective_timeout(override_limit: Option<Duration>, default: Duration) -> Duration {
    override_limit.unwrap_or(default)
}
