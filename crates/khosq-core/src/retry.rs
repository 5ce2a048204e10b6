//! Retry with exponential backoff for provider calls.
//!
//! The retry loop is rate-limiter aware: before every attempt it blocks on
//! the provider's token bucket, and it reports successes and 429s back so
//! the adaptive factor tracks vendor behavior. Between attempts it invokes
//! an async hook so callers can poll for job cancellation and abort the
//! loop cleanly.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

use crate::error::{CoreError, Result};
use crate::ratelimit::rate_limiter;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the initial one.
    pub max_retries: u32,
    /// Base delay in seconds (grows exponentially per attempt).
    pub base_delay: f64,
    /// Delay cap in seconds.
    pub max_delay: f64,
    /// Exponent base for the backoff curve.
    pub exponential_base: f64,
    /// Upper bound of the uniform jitter added to every delay, in seconds.
    pub jitter_max: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: 1.0,
            max_delay: 60.0,
            exponential_base: 2.0,
            jitter_max: 1.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next retry, in seconds.
    ///
    /// A vendor-supplied `retry_after` overrides the backoff curve; jitter
    /// is added in both cases so synchronized workers fan out.
    pub fn delay_for_attempt(&self, attempt: u32, retry_after: Option<f64>) -> f64 {
        let jitter = if self.jitter_max > 0.0 {
            rand::thread_rng().gen_range(0.0..self.jitter_max)
        } else {
            0.0
        };

        if let Some(retry_after) = retry_after {
            return retry_after + jitter;
        }

        let delay = (self.base_delay * self.exponential_base.powi(attempt as i32))
            .min(self.max_delay);
        delay + jitter
    }
}

/// A no-op retry hook for callers without a cancellation source.
pub async fn no_cancellation(_attempt: u32, _error: String, _delay: f64) -> Result<()> {
    Ok(())
}

/// Execute `op` with retry and exponential backoff.
///
/// - When `provider` is set, every attempt first blocks on the rate
///   limiter; successes and rate limits are reported back to it.
/// - Rate-limit errors honor the vendor's `retry_after` when present.
/// - Non-retryable provider errors propagate immediately.
/// - Any other error is treated as a retryable transient fault.
/// - `on_retry(attempt, error, delay)` runs before each sleep; returning
///   `Err` (typically `CoreError::JobCancelled`) aborts the loop.
pub async fn retry_with_backoff<T, Op, Fut, Hook, HookFut>(
    mut op: Op,
    policy: &RetryPolicy,
    provider: Option<&str>,
    mut on_retry: Hook,
) -> Result<T>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    Hook: FnMut(u32, String, f64) -> HookFut,
    HookFut: Future<Output = Result<()>>,
{
    let mut attempt = 0u32;

    loop {
        if let Some(name) = provider {
            rate_limiter().acquire(name, 1.0).await;
        }

        let err = match op().await {
            Ok(value) => {
                if let Some(name) = provider {
                    rate_limiter().report_success(name).await;
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        // Cooperative aborts are never retried and never logged as failures.
        if err.is_cancellation() {
            return Err(err);
        }

        let retry_after = match &err {
            CoreError::Provider(p) if p.is_rate_limit() => {
                if let Some(name) = provider {
                    rate_limiter().report_rate_limit(name, p.retry_after()).await;
                }
                p.retry_after()
            }
            _ => None,
        };

        if !err.is_retryable() {
            error!(provider, error = %err, "non-retryable provider error");
            return Err(err);
        }

        if attempt >= policy.max_retries {
            error!(
                provider,
                attempts = attempt + 1,
                error = %err,
                "max retries exceeded"
            );
            return Err(err);
        }

        let delay = policy.delay_for_attempt(attempt, retry_after);
        warn!(
            provider,
            attempt = attempt + 1,
            max_retries = policy.max_retries,
            delay,
            error = %err,
            "retrying after error"
        );

        on_retry(attempt, err.to_string(), delay).await?;
        tokio::time::sleep(Duration::from_secs_f64(delay)).await;

        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: 0.001,
            max_delay: 0.01,
            exponential_base: 2.0,
            jitter_max: 0.0,
        }
    }

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let policy = RetryPolicy {
            jitter_max: 0.0,
            ..Default::default()
        };
        assert_eq!(policy.delay_for_attempt(0, None), 1.0);
        assert_eq!(policy.delay_for_attempt(1, None), 2.0);
        assert_eq!(policy.delay_for_attempt(2, None), 4.0);
        assert_eq!(policy.delay_for_attempt(10, None), 60.0);
    }

    #[test]
    fn retry_after_overrides_backoff() {
        let policy = RetryPolicy {
            jitter_max: 0.0,
            ..Default::default()
        };
        assert_eq!(policy.delay_for_attempt(4, Some(17.5)), 17.5);
    }

    #[test]
    fn jitter_stays_within_bound() {
        let policy = RetryPolicy::default();
        for attempt in 0..5 {
            let base = RetryPolicy {
                jitter_max: 0.0,
                ..policy.clone()
            }
            .delay_for_attempt(attempt, None);
            let jittered = policy.delay_for_attempt(attempt, None);
            assert!(jittered >= base && jittered < base + policy.jitter_max);
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_op = calls.clone();

        let result = retry_with_backoff(
            move || {
                let calls = calls_op.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(CoreError::internal("transient"))
                    } else {
                        Ok(42u32)
                    }
                }
            },
            &fast_policy(),
            None,
            no_cancellation,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_provider_error_short_circuits() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_op = calls.clone();

        let result: Result<()> = retry_with_backoff(
            move || {
                let calls = calls_op.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(CoreError::Provider(ProviderError::Rejected {
                        provider: "openai".to_string(),
                        message: "401 unauthorized".to_string(),
                    }))
                }
            },
            &fast_policy(),
            None,
            no_cancellation,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_retries_then_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_op = calls.clone();
        let policy = fast_policy();

        let result: Result<()> = retry_with_backoff(
            move || {
                let calls = calls_op.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(CoreError::internal("still broken"))
                }
            },
            &policy,
            None,
            no_cancellation,
        )
        .await;

        assert!(result.is_err());
        // initial attempt + max_retries
        assert_eq!(calls.load(Ordering::SeqCst), policy.max_retries + 1);
    }

    #[tokio::test]
    async fn cancellation_hook_aborts_the_loop() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_op = calls.clone();

        let result: Result<()> = retry_with_backoff(
            move || {
                let calls = calls_op.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(CoreError::internal("transient"))
                }
            },
            &fast_policy(),
            None,
            |_attempt, _err, _delay| async { Err(CoreError::cancelled("job gone")) },
        )
        .await;

        match result {
            Err(CoreError::JobCancelled(_)) => {}
            other => panic!("expected JobCancelled, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
