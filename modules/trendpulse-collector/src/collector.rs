//! The fallback orchestrator: one `collect` call per (country, cycle).
//!
//! Tiers are tried strictly in configured priority order, never
//! concurrently — ordered fallback and breaker semantics both depend on
//! it. The request deadline is advisory: it stops further waits and tiers
//! but never force-kills an in-flight call, which is bounded by its own
//! shorter per-call timeout instead.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use trendpulse_common::{
    AttemptOutcome, CollectError, CollectionRequest, CollectionResult, CollectorConfig, DataType,
    SourceAttempt, SourceError, SourceKey,
};

use crate::cache::{CacheKey, ResponseCache};
use crate::circuit::CircuitBreaker;
use crate::health::HealthRegistry;
use crate::rate_limit::RateLimiter;
use crate::traits::TrendSource;

pub struct TrendCollector {
    /// Tiers in priority order, as configured.
    sources: Vec<Arc<dyn TrendSource>>,
    limiter: Arc<RateLimiter>,
    breaker: Arc<CircuitBreaker>,
    cache: Arc<ResponseCache>,
    health: Arc<HealthRegistry>,
    token_costs: HashMap<DataType, f64>,
    call_timeout: std::time::Duration,
}

impl TrendCollector {
    pub fn new(
        sources: Vec<Arc<dyn TrendSource>>,
        limiter: Arc<RateLimiter>,
        breaker: Arc<CircuitBreaker>,
        cache: Arc<ResponseCache>,
        health: Arc<HealthRegistry>,
        config: &CollectorConfig,
    ) -> Self {
        Self {
            sources,
            limiter,
            breaker,
            cache,
            health,
            token_costs: config.token_costs.clone(),
            call_timeout: config.call_timeout,
        }
    }

    /// Satisfy one collection request, walking the tier chain and falling
    /// back to the stale cache as a last resort. Fails only when every tier
    /// and the cache are exhausted.
    pub async fn collect(
        &self,
        request: CollectionRequest,
    ) -> Result<CollectionResult, CollectError> {
        let deadline = Instant::now() + request.deadline;
        let cache_key = CacheKey::from(&request);

        // A result still inside its freshness window satisfies the request
        // without spending any source budget.
        if let Some(hit) = self.cache.get(&cache_key) {
            if hit.is_fresh {
                debug!(
                    data_type = %request.data_type,
                    country = %request.country,
                    "Fresh cache hit"
                );
                return Ok(CollectionResult {
                    items: hit.items,
                    source: None,
                    is_stale: false,
                    fetched_at: hit.inserted_at,
                });
            }
        }

        let cost = self
            .token_costs
            .get(&request.data_type)
            .copied()
            .unwrap_or(1.0);
        let mut attempts: Vec<SourceAttempt> = Vec::new();

        for source in &self.sources {
            let kind = source.kind();
            let key = SourceKey::new(kind, request.country);

            if Instant::now() >= deadline {
                debug!(key = %key, "Request deadline passed, skipping remaining tiers");
                attempts.push(SourceAttempt {
                    source: kind,
                    outcome: AttemptOutcome::DeadlineExceeded,
                });
                continue;
            }

            // An open circuit skips the tier without waiting on its bucket.
            if !self.breaker.allow(key) {
                debug!(key = %key, "Circuit open, skipping tier");
                attempts.push(SourceAttempt {
                    source: kind,
                    outcome: AttemptOutcome::CircuitOpen,
                });
                continue;
            }

            if !self.limiter.acquire_until(key, cost, deadline).await {
                debug!(key = %key, "Rate-limit wait would exceed deadline, skipping tier");
                attempts.push(SourceAttempt {
                    source: kind,
                    outcome: AttemptOutcome::RateLimited,
                });
                continue;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            let per_call = self.call_timeout.min(remaining);
            let started = Instant::now();

            let outcome: Result<_, SourceError> =
                match tokio::time::timeout(per_call, source.fetch(&request)).await {
                    Ok(Ok(items)) if items.is_empty() => {
                        Err(SourceError::unknown("no items returned"))
                    }
                    Ok(Ok(items)) => Ok(items),
                    Ok(Err(err)) => Err(err),
                    Err(_) => Err(SourceError::timeout(format!(
                        "tier call exceeded {:.1}s",
                        per_call.as_secs_f64()
                    ))),
                };

            match outcome {
                Ok(items) => {
                    let latency = started.elapsed();
                    self.breaker.record_success(key);
                    self.health.record_success(key, latency);
                    self.cache.put(cache_key.clone(), items.clone());
                    info!(
                        key = %key,
                        data_type = %request.data_type,
                        count = items.len(),
                        latency_ms = latency.as_millis() as u64,
                        "Collection succeeded"
                    );
                    return Ok(CollectionResult {
                        items,
                        source: Some(kind),
                        is_stale: false,
                        fetched_at: Utc::now(),
                    });
                }
                Err(err) => {
                    self.breaker.record_failure(key);
                    self.health.record_failure(key);
                    warn!(key = %key, error = %err, "Tier failed, advancing fallback chain");
                    attempts.push(SourceAttempt {
                        source: kind,
                        outcome: AttemptOutcome::Failed(err),
                    });
                }
            }
        }

        // Every live tier failed or was skipped: serve the most recent
        // cached value no matter its age, marked stale.
        if let Some(hit) = self.cache.get_stale(&cache_key) {
            warn!(
                data_type = %request.data_type,
                country = %request.country,
                fetched_at = %hit.inserted_at,
                "All sources failed, serving stale cache"
            );
            return Ok(CollectionResult {
                items: hit.items,
                source: None,
                is_stale: true,
                fetched_at: hit.inserted_at,
            });
        }

        let err = CollectError::AllSourcesExhausted {
            data_type: request.data_type,
            country: request.country,
            attempts,
        };
        error!(error = %err, "Collection failed with no usable cache");
        Err(err)
    }

    /// Observational health snapshot across all keys touched so far.
    pub fn health_snapshot(&self) -> Vec<(SourceKey, crate::health::SourceHealth)> {
        self.health.snapshot()
    }
}
