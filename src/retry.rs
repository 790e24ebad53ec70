//! Bounded retry with linear backoff.
//!
//! The n-th failed attempt is followed by a sleep of `n * backoff_base` before
//! the next one, so a policy with 3 retries and a 5s base waits 5s, 10s and
//! 15s and makes at most 4 attempts. Sleeping goes through `tokio::time`, so
//! tests can drive the policy on a paused clock.

use crate::error::{HarvestError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Retry configuration for one fetch call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 disables retrying)
    pub max_retries: u32,
    /// Base unit of the linear backoff
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            max_retries,
            backoff_base,
        }
    }

    /// A single attempt, no retries
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Upper bound on network attempts per call
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Sleep after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(attempt)
    }

    /// Total sleep if every attempt fails
    pub fn total_backoff(&self) -> Duration {
        (1..=self.max_retries).map(|a| self.delay_for(a)).sum()
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// `op` receives the 1-based attempt number. The final error is wrapped in
    /// [`HarvestError::RetriesExhausted`].
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts => {
                    let wait = self.delay_for(attempt);
                    warn!(
                        target_url = label,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        error = %e,
                        "Request failed"
                    );
                    info!(wait_secs = wait.as_secs_f64(), "Waiting before next attempt");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(HarvestError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    })
                }
            }
        }
    }
}
