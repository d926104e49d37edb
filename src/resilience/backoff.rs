//! Exponential backoff with optional jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Delay before the retry that follows attempt `attempt` (0-based).
///
/// `min(base_ms × factor^attempt, max_ms)`, saturating at `max_ms` on overflow.
pub fn exponential_delay(attempt: u32, base_ms: u64, max_ms: u64, factor: f64) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let raw = base_ms as f64 * factor.powi(exponent);
    let capped = if raw.is_finite() {
        raw.min(max_ms as f64)
    } else {
        max_ms as f64
    };
    Duration::from_millis(capped.round() as u64)
}

/// Add up to `ratio` of `delay` as random extra wait.
pub fn apply_jitter(delay: Duration, ratio: f64) -> Duration {
    if ratio <= 0.0 {
        return delay;
    }

    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    let jitter_range = (delay_ms as f64 * ratio) as u64;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(delay_ms.saturating_add(jitter))
}

/// Backoff for `attempt` under `config`, jitter included.
pub fn calculate_backoff(config: &RetryConfig, attempt: u32) -> Duration {
    let delay = exponential_delay(
        attempt,
        config.base_delay_ms,
        config.max_delay_ms,
        config.backoff_factor,
    );
    apply_jitter(delay, config.jitter_ratio)
}
