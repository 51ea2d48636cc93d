//! Bounded retry with backoff for exchange requests
//!
//! Rate-limit responses back off exponentially (base, 2x base, 4x base, ...),
//! stretched to the server's `Retry-After` when that is longer. Transport
//! faults back off by a fixed `base`. Anything else fails immediately.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::common::errors::{EngineError, Result};

/// Longest `Retry-After` the policy will honour
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Kind of failure the policy knows how to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryKind {
    RateLimited,
    Transport,
}

impl RetryKind {
    pub fn classify(err: &EngineError) -> Option<Self> {
        if err.is_rate_limit() {
            Some(RetryKind::RateLimited)
        } else if err.is_transport() {
            Some(RetryKind::Transport)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the next attempt after `failed_attempt` (0-based) failed
    pub fn delay_for(&self, kind: RetryKind, failed_attempt: u32) -> Duration {
        match kind {
            RetryKind::RateLimited => {
                self.base_delay.saturating_mul(1u32 << failed_attempt.min(16))
            }
            RetryKind::Transport => self.base_delay,
        }
    }

    /// Delay before retrying `err`, honouring a capped `Retry-After`
    pub fn delay_after(&self, err: &EngineError, kind: RetryKind, failed_attempt: u32) -> Duration {
        let backoff = self.delay_for(kind, failed_attempt);
        match err.retry_after() {
            Some(requested) => backoff.max(requested.min(MAX_RETRY_AFTER)),
            None => backoff,
        }
    }

    /// Every delay the policy would sleep if all attempts failed with `kind`
    pub fn schedule(&self, kind: RetryKind) -> Vec<Duration> {
        (0..self.max_attempts - 1)
            .map(|attempt| self.delay_for(kind, attempt))
            .collect()
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let Some(kind) = RetryKind::classify(&err) else {
                return Err(err);
            };

            if attempt + 1 >= self.max_attempts {
                return Err(EngineError::RetriesExhausted {
                    attempts: self.max_attempts,
                    last_error: err.to_string(),
                });
            }

            let delay = self.delay_after(&err, kind, attempt);
            warn!(
                "{} failed on attempt {}/{} ({}), retrying in {:?}",
                label,
                attempt + 1,
                self.max_attempts,
                err,
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
