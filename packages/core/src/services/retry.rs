//! Retry policy for MyTurn requests.
//!
//! Mirrors what the API needs in practice: it rate-limits with 403/429
//! and fronts a gateway that occasionally answers 5xx. Those statuses are
//! retried with exponential backoff plus jitter; anything else fails fast.

use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;

/// Statuses treated as transient.
pub const RETRYABLE_STATUSES: [u16; 6] = [403, 429, 500, 502, 503, 504];

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// No waiting between attempts.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    pub fn is_retryable(&self, status: StatusCode) -> bool {
        RETRYABLE_STATUSES.contains(&status.as_u16())
    }

    /// `true` once `attempt` (1-based) has used up the retry budget.
    pub fn exhausted(&self, attempt: u32) -> bool {
        attempt > self.max_retries
    }

    /// Backoff before the attempt following `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let backoff = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);

        let jitter_ms = self.max_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return backoff;
        }

        backoff + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}
