use crate::error::ClaimError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry(Duration),
    Fail,
}

/// Exponential backoff for access-denied / rate-limited failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// `base_delay * 2^attempt`
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Decide after attempt number `attempt` (zero-based) failed with `error`.
    pub fn decide(&self, error: &ClaimError, attempt: u32) -> RetryDecision {
        if error.is_retryable() && attempt + 1 < self.max_attempts {
            RetryDecision::Retry(self.backoff(attempt))
        } else {
            RetryDecision::Fail
        }
    }

    /// Run `op` until it succeeds, fails terminally, or attempts run out.
    /// `op` receives the zero-based attempt index.
    pub async fn execute<T, F, Fut>(&self, mut op: F) -> Result<T, ClaimError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ClaimError>>,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => match self.decide(&e, attempt) {
                    RetryDecision::Retry(delay) => {
                        warn!(
                            "Attempt {}/{} failed ({e}), retrying in {:?}",
                            attempt + 1,
                            self.max_attempts,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    RetryDecision::Fail => return Err(e),
                },
            }
        }
    }
}
