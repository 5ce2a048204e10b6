//! Adaptive token-bucket rate limiting for STT providers.
//!
//! One bucket per provider: `max_tokens` is the burst budget (rpm/6 by
//! default), the refill rate is `rpm/60` tokens per second, and every
//! transcription call consumes one token. An adaptive factor in
//! `[0.1, 1.0]` scales the effective refill rate: each reported 429 halves
//! it, each reported success nudges it back up by 10%. Over a few minutes
//! the emitted request rate converges to what the vendor actually
//! tolerates, which matters because the configured rpm is shared by every
//! worker process without cross-process coordination.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Lower bound for the adaptive factor.
const MIN_ADAPTIVE_FACTOR: f64 = 0.1;

/// State for a single rate limit bucket.
#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_update: Instant,
    max_tokens: f64,
    /// Tokens per second before the adaptive factor is applied.
    refill_rate: f64,
    adaptive_factor: f64,
}

impl BucketState {
    /// Tokens available at `now`, capped at the burst budget.
    fn available_tokens(&self, now: Instant) -> f64 {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        let new_tokens = elapsed * self.refill_rate * self.adaptive_factor;
        (self.tokens + new_tokens).min(self.max_tokens)
    }
}

/// Snapshot of a bucket for observability.
#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    pub available_tokens: f64,
    pub max_tokens: f64,
    pub refill_rate: f64,
    pub adaptive_factor: f64,
}

/// Token bucket rate limiter with adaptive backoff.
///
/// A global mutex guards the provider map; a per-provider mutex serializes
/// each bucket, so acquisition for one provider never blocks another.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Arc<Mutex<BucketState>>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Configure the budget for a provider.
    ///
    /// `burst_size` defaults to roughly ten seconds of budget (rpm/6).
    pub async fn configure_provider(
        &self,
        provider: &str,
        requests_per_minute: u32,
        burst_size: Option<u32>,
    ) {
        let burst = burst_size.unwrap_or_else(|| (requests_per_minute / 6).max(1));
        let refill_rate = requests_per_minute as f64 / 60.0;

        let bucket = BucketState {
            tokens: burst as f64,
            last_update: Instant::now(),
            max_tokens: burst as f64,
            refill_rate,
            adaptive_factor: 1.0,
        };

        let mut buckets = self.buckets.lock().await;
        buckets.insert(provider.to_string(), Arc::new(Mutex::new(bucket)));

        info!(
            provider,
            rpm = requests_per_minute,
            burst,
            "configured rate limiter"
        );
    }

    async fn bucket(&self, provider: &str) -> Option<Arc<Mutex<BucketState>>> {
        let buckets = self.buckets.lock().await;
        buckets.get(provider).cloned()
    }

    /// Acquire `tokens` from the bucket, sleeping if necessary.
    ///
    /// Returns the wait time in seconds (0 if tokens were available).
    /// Providers without a configured bucket are unlimited.
    pub async fn acquire(&self, provider: &str, tokens: f64) -> f64 {
        let Some(bucket) = self.bucket(provider).await else {
            return 0.0;
        };

        let mut state = bucket.lock().await;
        let now = Instant::now();
        let available = state.available_tokens(now);

        if available >= tokens {
            state.tokens = available - tokens;
            state.last_update = now;
            return 0.0;
        }

        let tokens_needed = tokens - available;
        let wait_time = tokens_needed / (state.refill_rate * state.adaptive_factor);

        debug!(
            provider,
            wait_seconds = wait_time,
            tokens_needed,
            "rate limit wait"
        );

        // Hold the bucket lock across the sleep: acquisition is serialized
        // per provider so waiters cannot stampede the refill.
        tokio::time::sleep(std::time::Duration::from_secs_f64(wait_time)).await;

        state.tokens = 0.0;
        state.last_update = Instant::now();

        wait_time
    }

    /// Try to acquire tokens without waiting.
    pub async fn try_acquire(&self, provider: &str, tokens: f64) -> bool {
        let Some(bucket) = self.bucket(provider).await else {
            return true;
        };

        let mut state = bucket.lock().await;
        let now = Instant::now();
        let available = state.available_tokens(now);

        if available >= tokens {
            state.tokens = available - tokens;
            state.last_update = now;
            return true;
        }

        false
    }

    /// Report a 429/quota response from the provider.
    ///
    /// Halves the adaptive factor (floor 0.1) and drains the bucket so the
    /// next acquisition waits for a full refill.
    pub async fn report_rate_limit(&self, provider: &str, retry_after: Option<f64>) {
        let Some(bucket) = self.bucket(provider).await else {
            return;
        };

        let mut state = bucket.lock().await;
        state.adaptive_factor = (state.adaptive_factor * 0.5).max(MIN_ADAPTIVE_FACTOR);
        state.tokens = 0.0;
        state.last_update = Instant::now();

        warn!(
            provider,
            adaptive_factor = state.adaptive_factor,
            retry_after,
            "rate limit reported, reducing throughput"
        );
    }

    /// Report a successful request, gradually restoring throughput.
    pub async fn report_success(&self, provider: &str) {
        let Some(bucket) = self.bucket(provider).await else {
            return;
        };

        let mut state = bucket.lock().await;
        if state.adaptive_factor < 1.0 {
            state.adaptive_factor = (state.adaptive_factor * 1.1).min(1.0);
        }
    }

    /// Current bucket state for a provider, None when unconfigured.
    pub async fn status(&self, provider: &str) -> Option<RateLimitStatus> {
        let bucket = self.bucket(provider).await?;
        let state = bucket.lock().await;
        let now = Instant::now();
        Some(RateLimitStatus {
            available_tokens: state.available_tokens(now),
            max_tokens: state.max_tokens,
            refill_rate: state.refill_rate,
            adaptive_factor: state.adaptive_factor,
        })
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Get the process-wide rate limiter.
pub fn rate_limiter() -> &'static RateLimiter {
    static LIMITER: OnceLock<RateLimiter> = OnceLock::new();
    LIMITER.get_or_init(RateLimiter::new)
}
