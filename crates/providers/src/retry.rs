//! Retry policy for gateway calls.
//!
//! Two independent recoveries:
//! - a model that rejects a custom temperature gets one retry without it
//! - 502/503/504 get a bounded number of retries with exponential backoff

use std::time::Duration;

use courier_config::RetryConfig;

/// Tunables for transient-failure retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Further attempts allowed after transient gateway failures
    pub max_transient_retries: u32,
    /// Delay before the first transient retry; doubles each time
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_transient_retries: 2,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_transient_retries: config.max_transient_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Backoff before transient retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay
            .checked_mul(2u32.saturating_pow(retry))
            .unwrap_or(Duration::MAX)
    }

    /// Gateway statuses worth retrying.
    pub fn is_transient(status: u16) -> bool {
        matches!(status, 502..=504)
    }

    /// A 400 complaining that the model only takes its default temperature.
    pub fn is_temperature_rejection(status: u16, body: &str) -> bool {
        if status != 400 {
            return false;
        }
        let lower = body.to_lowercase();
        lower.contains("temperature")
            && (lower.contains("only the default")
                || lower.contains("unsupported")
                || lower.contains("not supported"))
    }
}

/// Per-call bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Requests sent so far
    pub attempts: u32,
    /// Transient retries consumed
    pub transient_retries: u32,
    /// Whether temperature has already been stripped
    pub temperature_dropped: bool,
}
