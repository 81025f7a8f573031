//! Bounded exponential backoff for upstream requests.
//!
//! Only transient errors (`UpstreamUnavailable`, `RateLimited`) are
//! retried. A rate-limit retry honors the provider-supplied hint instead
//! of the exponential schedule, capped so a hostile header cannot stall
//! a bulk download indefinitely.

use crate::provider::DataError;
use rand::Rng;
use std::time::Duration;

const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub(crate) struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// the attempt budget is exhausted.
    pub fn run<T>(&self, mut op: impl FnMut() -> Result<T, DataError>) -> Result<T, DataError> {
        let mut last_error: Option<DataError> = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                std::thread::sleep(self.delay_before(attempt, last_error.as_ref()));
            }

            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| DataError::UpstreamUnavailable("retries exhausted".into())))
    }

    fn delay_before(&self, attempt: u32, last_error: Option<&DataError>) -> Duration {
        if let Some(DataError::RateLimited { retry_after_secs }) = last_error {
            return Duration::from_secs(*retry_after_secs).min(MAX_RETRY_AFTER);
        }

        let backoff = self.base_delay * 2u32.pow(attempt - 1);
        let jitter_budget = (backoff.as_millis() as u64 / 4).max(1);
        let jitter = rand::thread_rng().gen_range(0..jitter_budget);
        backoff + Duration::from_millis(jitter)
    }
}
