//! Last-successful-result cache, keyed by (data type, country, niche).
//!
//! Entries are immutable once written: a newer result replaces the whole
//! entry, and concurrent writers race last-write-wins. Staleness is
//! computed lazily at read time; there is no eviction thread.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::debug;

use trendpulse_common::{CollectionRequest, CollectorConfig, CountryCode, DataType, NicheType, TrendItem};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub data_type: DataType,
    pub country: CountryCode,
    pub niche: Option<NicheType>,
}

impl From<&CollectionRequest> for CacheKey {
    fn from(request: &CollectionRequest) -> Self {
        Self {
            data_type: request.data_type,
            country: request.country,
            niche: request.niche,
        }
    }
}

struct CacheEntry {
    items: Vec<TrendItem>,
    /// Monotonic stamp for TTL arithmetic.
    inserted_mono: Instant,
    /// Wall-clock stamp reported back as `fetched_at` on cache-served results.
    inserted_at: DateTime<Utc>,
    ttl: Duration,
}

/// What a read produced: the items plus enough metadata for the caller to
/// mark results fresh or stale.
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub items: Vec<TrendItem>,
    pub is_fresh: bool,
    pub inserted_at: DateTime<Utc>,
}

pub struct ResponseCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    ttls: HashMap<DataType, Duration>,
    default_ttl: Duration,
    max_stale_age: Option<Duration>,
}

impl ResponseCache {
    pub fn new(config: &CollectorConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttls: config.cache_ttls.clone(),
            default_ttl: config.default_ttl,
            max_stale_age: config.max_stale_age,
        }
    }

    /// Store a successful result, replacing any previous entry for the key.
    pub fn put(&self, key: CacheKey, items: Vec<TrendItem>) {
        let ttl = self
            .ttls
            .get(&key.data_type)
            .copied()
            .unwrap_or(self.default_ttl);
        debug!(
            data_type = %key.data_type,
            country = %key.country,
            count = items.len(),
            ttl_secs = ttl.as_secs(),
            "Cached collection result"
        );
        let entry = CacheEntry {
            items,
            inserted_mono: Instant::now(),
            inserted_at: Utc::now(),
            ttl,
        };
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .insert(key, entry);
    }

    /// Read the entry for a key, reporting whether it is still inside its
    /// freshness window.
    pub fn get(&self, key: &CacheKey) -> Option<CacheLookup> {
        let entries = self.entries.lock().expect("cache mutex poisoned");
        let entry = entries.get(key)?;
        Some(CacheLookup {
            items: entry.items.clone(),
            is_fresh: entry.inserted_mono.elapsed() < entry.ttl,
            inserted_at: entry.inserted_at,
        })
    }

    /// Read the most recent entry regardless of TTL — the degraded-mode
    /// path when every live tier has failed. `max_stale_age`, when set,
    /// still bounds how old a value may be served.
    pub fn get_stale(&self, key: &CacheKey) -> Option<CacheLookup> {
        let entries = self.entries.lock().expect("cache mutex poisoned");
        let entry = entries.get(key)?;
        let age = entry.inserted_mono.elapsed();
        if let Some(max_age) = self.max_stale_age {
            if age > max_age {
                debug!(
                    data_type = %key.data_type,
                    country = %key.country,
                    age_secs = age.as_secs(),
                    "Stale entry past max age, treating as miss"
                );
                return None;
            }
        }
        Some(CacheLookup {
            items: entry.items.clone(),
            is_fresh: age < entry.ttl,
            inserted_at: entry.inserted_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::trend_items;
    use tokio::time::advance;

    fn hashtags_key() -> CacheKey {
        CacheKey {
            data_type: DataType::Hashtags,
            country: CountryCode::US,
            niche: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn entry_is_fresh_until_its_ttl_elapses() {
        // hashtags TTL: 3600s
        let cache = ResponseCache::new(&CollectorConfig::default());
        let key = hashtags_key();
        cache.put(key.clone(), trend_items(3));

        advance(Duration::from_secs(3599)).await;
        let hit = cache.get(&key).unwrap();
        assert!(hit.is_fresh);
        assert_eq!(hit.items.len(), 3);

        advance(Duration::from_secs(2)).await;
        let hit = cache.get(&key).unwrap();
        assert!(!hit.is_fresh);
    }

    #[tokio::test(start_paused = true)]
    async fn get_stale_ignores_age_by_default() {
        let cache = ResponseCache::new(&CollectorConfig::default());
        let key = hashtags_key();
        cache.put(key.clone(), trend_items(5));

        advance(Duration::from_secs(30 * 24 * 3600)).await;
        let hit = cache.get_stale(&key).unwrap();
        assert!(!hit.is_fresh);
        assert_eq!(hit.items.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn max_stale_age_bounds_degraded_reads_when_set() {
        let config = CollectorConfig {
            max_stale_age: Some(Duration::from_secs(24 * 3600)),
            ..CollectorConfig::default()
        };
        let cache = ResponseCache::new(&config);
        let key = hashtags_key();
        cache.put(key.clone(), trend_items(5));

        advance(Duration::from_secs(23 * 3600)).await;
        assert!(cache.get_stale(&key).is_some());

        advance(Duration::from_secs(2 * 3600)).await;
        assert!(cache.get_stale(&key).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn newer_write_replaces_the_entry() {
        let cache = ResponseCache::new(&CollectorConfig::default());
        let key = hashtags_key();
        cache.put(key.clone(), trend_items(3));
        cache.put(key.clone(), trend_items(7));

        let hit = cache.get(&key).unwrap();
        assert_eq!(hit.items.len(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn niche_distinguishes_cache_entries() {
        let cache = ResponseCache::new(&CollectorConfig::default());
        let plain = hashtags_key();
        let niched = CacheKey {
            niche: Some(NicheType::Booktok),
            ..plain.clone()
        };
        cache.put(niched.clone(), trend_items(2));

        assert!(cache.get(&plain).is_none());
        assert_eq!(cache.get(&niched).unwrap().items.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_key_is_a_miss_on_both_paths() {
        let cache = ResponseCache::new(&CollectorConfig::default());
        assert!(cache.get(&hashtags_key()).is_none());
        assert!(cache.get_stale(&hashtags_key()).is_none());
    }
}
