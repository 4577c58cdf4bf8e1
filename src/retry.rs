//! Bounded retry with exponential backoff for idempotent adapter calls
//!
//! Generation and synthesis requests can be repeated safely. The default
//! policy performs no retries, so a transport failure aborts the turn unless
//! retries are enabled in configuration.

use std::future::Future;
use std::time::{Duration, SystemTime};

use crate::Result;

/// Retry policy for generation and synthesis calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first call
    pub max_retries: u32,
    /// Base delay between retries (doubles each attempt)
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// Compute the delay before the next retry attempt.
///
/// `min(base_delay * 2^attempt + jitter, max_delay)` where jitter is 0-25% of
/// the computed delay, derived from `SystemTime` to avoid pulling in a full
/// random number generator.
#[must_use]
pub fn delay_for_attempt(policy: &RetryPolicy, attempt: u32) -> Duration {
    let base = policy
        .base_delay
        .saturating_mul(2u32.saturating_pow(attempt));
    let base = base.min(policy.max_delay);

    let jitter_nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();

    let jitter_fraction = f64::from(jitter_nanos % 250) / 1000.0;
    let jitter = base.mul_f64(jitter_fraction);

    (base + jitter).min(policy.max_delay)
}

/// Run `call` until it succeeds, fails permanently, or retries run out
///
/// Only errors for which [`crate::Error::is_transient`] holds are retried.
///
/// # Errors
///
/// Returns the last error produced by `call`
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, operation: &'static str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                let delay = delay_for_attempt(policy, attempt);
                attempt += 1;
                tracing::warn!(
                    operation,
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
