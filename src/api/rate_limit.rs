//! Token bucket rate limiting.
//!
//! Used to cap how many organizations a single user can create per hour
//! (`ORGDESK_ORG_CREATE_PER_HOUR`, default 5).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    last_refill: Instant,
    refill_per_sec: f64,
}

impl TokenBucket {
    fn full(capacity: u32, period: Duration) -> Self {
        Self {
            tokens: capacity as f64,
            capacity: capacity as f64,
            last_refill: Instant::now(),
            refill_per_sec: capacity as f64 / period.as_secs_f64(),
        }
    }

    /// Take one token, or report how many seconds until one is available.
    fn take(&mut self, now: Instant) -> Result<(), u32> {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let wait = (1.0 - self.tokens) / self.refill_per_sec;
            Err((wait.ceil() as u32).max(1))
        }
    }
}

/// Per-key token bucket limiter.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<String, TokenBucket>>>,
    capacity: u32,
    period: Duration,
}

impl RateLimiter {
    /// `capacity` requests per `period`, refilled continuously.
    pub fn new(capacity: u32, period: Duration) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
            period,
        }
    }

    pub fn per_hour(capacity: u32) -> Self {
        Self::new(capacity, Duration::from_secs(3600))
    }

    /// `Ok(())` when allowed, `Err(retry_after_secs)` when limited.
    pub async fn check_rate_limit(&self, key: &str) -> Result<(), u32> {
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::full(self.capacity, self.period));

        match bucket.take(Instant::now()) {
            Ok(()) => {
                debug!(key = %key, remaining = bucket.tokens as u32, "rate limit check passed");
                Ok(())
            }
            Err(retry_after) => {
                warn!(key = %key, retry_after_seconds = retry_after, "rate limit exceeded");
                Err(retry_after)
            }
        }
    }
}
