//! Retry policy with doubling backoff and per-call timeouts.
//!
//! The router wraps every provider call in a [`RetryPolicy`]. Retryable
//! classes (network, timeout, upstream-unavailable, rate-limited,
//! bad-gateway) are retried with a delay that doubles each attempt; every
//! other class fails on the first error. Waiting uses `tokio::time::sleep`,
//! so retries in flight never hold a thread.
//!
//! # Example
//!
//! ```rust,ignore
//! use arborclaw::providers::RetryPolicy;
//!
//! let policy = RetryPolicy::new()
//!     .with_max_retries(5)
//!     .with_initial_backoff_ms(500);
//! let response = policy.run("openai", || provider.chat(turns.clone(), vec![], None, opts.clone())).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{ClawError, ProviderError, Result};

/// Retry settings shared by every provider call the router makes.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt. Default: 3.
    max_retries: u32,
    /// Delay before the first retry in milliseconds. Default: 1000.
    initial_backoff_ms: u64,
    /// Maximum delay cap in milliseconds. Default: 30000.
    max_backoff_ms: u64,
    /// Upper bound for one provider call. Default: 120 seconds.
    call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            call_timeout: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_backoff_ms(mut self, initial_backoff_ms: u64) -> Self {
        self.initial_backoff_ms = initial_backoff_ms;
        self
    }

    pub fn with_max_backoff_ms(mut self, max_backoff_ms: u64) -> Self {
        self.max_backoff_ms = max_backoff_ms;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Delay before retry number `attempt + 1`.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        compute_delay(attempt, self.initial_backoff_ms, self.max_backoff_ms)
    }

    /// Run `op` until it succeeds, fails with a terminal error, or the retry
    /// budget is spent. Each attempt is bounded by the call timeout, and a
    /// timeout counts as a retryable failure.
    ///
    /// Exhausting the budget surfaces the last error.
    pub async fn run<T, F, Fut>(&self, provider: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let outcome = match tokio::time::timeout(self.call_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(ClawError::Provider(ProviderError::Timeout(format!(
                    "{} did not answer within {:?}",
                    provider, self.call_timeout
                )))),
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !is_retryable(&err) || attempt >= self.max_retries {
                return Err(err);
            }

            let delay = self.backoff_ms(attempt);
            attempt += 1;
            warn!(
                provider = provider,
                attempt = attempt,
                max_retries = self.max_retries,
                delay_ms = delay,
                error = %err,
                "Retrying provider call after transient error"
            );
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}

/// Check whether an error is a transient provider failure worth retrying.
pub fn is_retryable(err: &ClawError) -> bool {
    match err {
        ClawError::Provider(pe) => pe.is_retryable(),
        ClawError::Http(e) => e.is_timeout() || e.is_connect(),
        _ => false,
    }
}

/// Doubling backoff: `min(initial_ms * 2^attempt, max_ms)`.
pub fn compute_delay(attempt: u32, initial_ms: u64, max_ms: u64) -> u64 {
    initial_ms
        .saturating_mul(1u64 << attempt.min(16))
        .min(max_ms)
}
