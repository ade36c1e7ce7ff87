//! Retry helpers with exponential backoff and jitter.

use crate::concurrency::cancelled_error;
use crate::{RequestContext, Result};
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Retry policy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts (including the first try).
    pub max_attempts: u32,
    /// Base delay for backoff in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Jitter ratio as percentage (0..=100).
    pub jitter_ratio_pct: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            max_delay_ms: 5_000,
            jitter_ratio_pct: 20,
        }
    }
}

/// Exponential backoff without jitter: `base * 2^(attempt - 1)`, capped at `max`.
///
/// `attempt` is 1-based; zero is treated as the first attempt.
///
/// ```
/// use codesync_shared::exponential_backoff_ms;
///
/// assert_eq!(exponential_backoff_ms(3_000, 60_000, 1), 3_000);
/// assert_eq!(exponential_backoff_ms(3_000, 60_000, 3), 12_000);
/// assert_eq!(exponential_backoff_ms(3_000, 60_000, 10), 60_000);
/// ```
#[must_use]
pub fn exponential_backoff_ms(base_ms: u64, max_ms: u64, attempt: u32) -> u64 {
    let pow = attempt.saturating_sub(1).min(32);
    base_ms
        .checked_mul(1u64 << pow)
        .unwrap_or(u64::MAX)
        .min(max_ms)
}

/// Retry a fallible async operation with backoff + jitter.
///
/// Only errors classified as retriable are retried.
pub async fn retry_async<T, F, Fut>(
    ctx: &RequestContext,
    policy: RetryPolicy,
    operation: &'static str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt = attempt.saturating_add(1);
        ctx.ensure_not_cancelled(operation)?;

        let error = match op().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        if !error.class.is_retriable() || attempt >= policy.max_attempts {
            return Err(error);
        }

        let delay = jittered_delay(policy, attempt);
        tokio::select! {
            () = ctx.cancelled() => return Err(cancelled_error(operation)),
            () = tokio::time::sleep(delay) => {},
        }
    }
}

fn jittered_delay(policy: RetryPolicy, attempt: u32) -> Duration {
    let capped = exponential_backoff_ms(policy.base_delay_ms, policy.max_delay_ms, attempt);
    let jitter_pct = u64::from(policy.jitter_ratio_pct.min(100));
    if jitter_pct == 0 || capped == 0 {
        return Duration::from_millis(capped);
    }
    let spread = capped.saturating_mul(jitter_pct) / 100;
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| u64::from(elapsed.subsec_nanos()));
    let offset = nanos % spread.saturating_mul(2).saturating_add(1);
    let delay = capped
        .saturating_sub(spread)
        .saturating_add(offset)
        .min(policy.max_delay_ms);
    Duration::from_millis(delay)
}
