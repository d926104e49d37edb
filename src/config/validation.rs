//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! constraints. Every violation is reported, not just the first one.

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{ClientConfig, RetryConfig};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g. `retries.backoff_factor`).
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a configuration, collecting all errors.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_retries(&config.retries, &mut errors);

    let breaker = &config.circuit_breaker;
    if breaker.failure_threshold == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.failure_threshold",
            "must be greater than 0",
        ));
    }
    if breaker.reset_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.reset_timeout_ms",
            "must be greater than 0",
        ));
    }

    if config.timeouts.request_ms == 0 {
        errors.push(ValidationError::new("timeouts.request_ms", "must be greater than 0"));
    }
    if config.timeouts.connect_ms == 0 {
        errors.push(ValidationError::new("timeouts.connect_ms", "must be greater than 0"));
    }

    let observability = &config.observability;
    if observability.log_level.trim().is_empty() {
        errors.push(ValidationError::new("observability.log_level", "must not be empty"));
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    let assistant = &config.assistant;
    match Url::parse(&assistant.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::new(
            "assistant.base_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(
            "assistant.base_url",
            format!("'{}' is not a valid URL: {}", assistant.base_url, e),
        )),
    }
    if !assistant.chat_path.starts_with('/') {
        errors.push(ValidationError::new("assistant.chat_path", "must start with '/'"));
    }
    if assistant.timeout_secs == 0 {
        errors.push(ValidationError::new("assistant.timeout_secs", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate retry settings on their own, e.g. a per-request override.
pub fn validate_retries(retries: &RetryConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_retries(retries, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_retries(retries: &RetryConfig, errors: &mut Vec<ValidationError>) {
    if retries.base_delay_ms == 0 {
        errors.push(ValidationError::new("retries.base_delay_ms", "must be greater than 0"));
    }
    if retries.max_delay_ms < retries.base_delay_ms {
        errors.push(ValidationError::new(
            "retries.max_delay_ms",
            format!(
                "must be >= base_delay_ms ({} < {})",
                retries.max_delay_ms, retries.base_delay_ms
            ),
        ));
    }
    if !(retries.backoff_factor.is_finite() && retries.backoff_factor > 1.0) {
        errors.push(ValidationError::new(
            "retries.backoff_factor",
            format!("must be a finite number greater than 1 (got {})", retries.backoff_factor),
        ));
    }
    if !(0.0..1.0).contains(&retries.jitter_ratio) {
        errors.push(ValidationError::new(
            "retries.jitter_ratio",
            format!("must be in [0, 1) (got {})", retries.jitter_ratio),
        ));
    }
}
