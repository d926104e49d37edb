//! Request error taxonomy and classification.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::resilience::{BreakerError, RetryPredicate};

/// Machine-readable classification carried by every [`RequestError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Timeout,
    NetworkError,
    Http(u16),
    CircuitOpen,
    InvalidRequest,
    InvalidResponse,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Timeout => f.write_str("TIMEOUT"),
            ErrorCode::NetworkError => f.write_str("NETWORK_ERROR"),
            ErrorCode::Http(status) => write!(f, "HTTP_{}", status),
            ErrorCode::CircuitOpen => f.write_str("CIRCUIT_OPEN"),
            ErrorCode::InvalidRequest => f.write_str("INVALID_REQUEST"),
            ErrorCode::InvalidResponse => f.write_str("INVALID_RESPONSE"),
        }
    }
}

/// Errors surfaced by the request executor and the services built on it.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Connection-level failure (DNS, refused, reset).
    #[error("network error: {0}")]
    Network(String),

    /// The attempt exceeded its deadline and was aborted.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Non-2xx response. `body` is truncated.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// A circuit breaker short-circuited the call.
    #[error("circuit breaker '{breaker}' is open (retry in {retry_after:?})")]
    CircuitOpen {
        breaker: String,
        retry_after: Duration,
    },

    /// The request could not be built (bad URL, header, body).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The response arrived but could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl RequestError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RequestError::Network(_) => ErrorCode::NetworkError,
            RequestError::Timeout(_) => ErrorCode::Timeout,
            RequestError::Http { status, .. } => ErrorCode::Http(*status),
            RequestError::CircuitOpen { .. } => ErrorCode::CircuitOpen,
            RequestError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            RequestError::InvalidResponse(_) => ErrorCode::InvalidResponse,
        }
    }

    /// HTTP status, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server errors, timeouts and connection failures are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            RequestError::Http { status, .. } => *status >= 500,
            RequestError::Timeout(_) | RequestError::Network(_) => true,
            _ => false,
        }
    }

    /// Classify a transport error from reqwest.
    ///
    /// `limit` is the attempt deadline, reported if reqwest timed out on its own.
    pub fn from_reqwest(err: reqwest::Error, limit: Duration) -> Self {
        if err.is_timeout() {
            RequestError::Timeout(limit)
        } else if err.is_builder() {
            RequestError::InvalidRequest(err.to_string())
        } else if err.is_decode() {
            RequestError::InvalidResponse(err.to_string())
        } else {
            RequestError::Network(err.to_string())
        }
    }
}

impl From<BreakerError<RequestError>> for RequestError {
    fn from(err: BreakerError<RequestError>) -> Self {
        match err {
            BreakerError::Open {
                breaker,
                retry_after,
            } => RequestError::CircuitOpen {
                breaker,
                retry_after,
            },
            BreakerError::Inner(inner) => inner,
        }
    }
}

/// Default retry predicate: HTTP >= 500, timeouts and network errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransientErrors;

impl RetryPredicate<RequestError> for TransientErrors {
    fn should_retry(&self, error: &RequestError) -> bool {
        error.is_transient()
    }
}
