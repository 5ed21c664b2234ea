//! Token-bucket admission control, one bucket per (source, country).
//!
//! Buckets refill continuously at the country tier's sustained rate and are
//! created lazily on first reference. The registry lock guards only map
//! lookup; each bucket carries its own lock, so unrelated source/country
//! pairs never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

use trendpulse_common::{CollectorConfig, CountryCode, RateTier, SourceKey};

/// Floor for computed waits so a lost refill race cannot spin the loop hot.
const MIN_WAIT: Duration = Duration::from_millis(5);

struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(tier: RateTier) -> Self {
        let capacity = f64::from(tier.burst_capacity);
        Self {
            tokens: capacity,
            capacity,
            refill_per_sec: tier.refill_per_sec(),
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    fn try_consume(&mut self, cost: f64) -> bool {
        if self.tokens >= cost {
            self.tokens -= cost;
            true
        } else {
            false
        }
    }

    /// Time until `cost` tokens will have accumulated.
    fn wait_for(&self, cost: f64) -> Duration {
        let deficit = cost - self.tokens;
        Duration::from_secs_f64(deficit / self.refill_per_sec)
    }
}

pub struct RateLimiter {
    buckets: Mutex<HashMap<SourceKey, Arc<Mutex<TokenBucket>>>>,
    tiers: HashMap<CountryCode, RateTier>,
    default_tier: RateTier,
}

impl RateLimiter {
    pub fn new(config: &CollectorConfig) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            tiers: config.rate_tiers.clone(),
            default_tier: config.default_tier,
        }
    }

    fn bucket(&self, key: SourceKey) -> Arc<Mutex<TokenBucket>> {
        let mut buckets = self.buckets.lock().expect("rate limiter registry poisoned");
        buckets
            .entry(key)
            .or_insert_with(|| {
                let tier = self
                    .tiers
                    .get(&key.country)
                    .copied()
                    .unwrap_or(self.default_tier);
                debug!(
                    key = %key,
                    rpm = tier.requests_per_minute,
                    burst = tier.burst_capacity,
                    "Created rate-limit bucket"
                );
                Arc::new(Mutex::new(TokenBucket::new(tier)))
            })
            .clone()
    }

    /// Consume `cost` tokens if available right now.
    pub fn try_acquire(&self, key: SourceKey, cost: f64) -> bool {
        let bucket = self.bucket(key);
        let mut bucket = bucket.lock().expect("rate limiter bucket poisoned");
        bucket.refill(Instant::now());
        bucket.try_consume(cost)
    }

    /// Wait until `cost` tokens are available, then consume them.
    pub async fn acquire(&self, key: SourceKey, cost: f64) {
        let bucket = self.bucket(key);
        loop {
            let wait = {
                let mut bucket = bucket.lock().expect("rate limiter bucket poisoned");
                bucket.refill(Instant::now());
                if bucket.try_consume(cost) {
                    return;
                }
                bucket.wait_for(cost)
            };
            sleep(wait.max(MIN_WAIT)).await;
        }
    }

    /// Like `acquire`, but gives up instead of sleeping past `deadline`.
    /// Returns `false` without consuming tokens when the wait will not fit.
    pub async fn acquire_until(&self, key: SourceKey, cost: f64, deadline: Instant) -> bool {
        let bucket = self.bucket(key);
        loop {
            let wait = {
                let mut bucket = bucket.lock().expect("rate limiter bucket poisoned");
                bucket.refill(Instant::now());
                if bucket.try_consume(cost) {
                    return true;
                }
                bucket.wait_for(cost)
            };
            let wait = wait.max(MIN_WAIT);
            if Instant::now() + wait > deadline {
                debug!(key = %key, wait_secs = wait.as_secs_f64(), "Rate-limit wait exceeds deadline");
                return false;
            }
            sleep(wait).await;
        }
    }

    /// Current token count for a key, after refill. Observational.
    pub fn available(&self, key: SourceKey) -> f64 {
        let bucket = self.bucket(key);
        let mut bucket = bucket.lock().expect("rate limiter bucket poisoned");
        bucket.refill(Instant::now());
        bucket.tokens
    }
}
