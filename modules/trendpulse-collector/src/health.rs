//! Observational per-source health accounting.
//!
//! Records success/failure counts and latency so operators can see which
//! tiers are struggling. Never consulted for routing — the circuit breaker
//! gates calls, and priority order is fixed configuration.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use trendpulse_common::SourceKey;

#[derive(Debug, Clone, Default)]
pub struct SourceHealth {
    pub success_count: u64,
    pub failure_count: u64,
    total_latency_ms: f64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
}

impl SourceHealth {
    /// Mean latency of successful calls, in milliseconds.
    pub fn avg_latency_ms(&self) -> f64 {
        if self.success_count == 0 {
            0.0
        } else {
            self.total_latency_ms / self.success_count as f64
        }
    }
}

pub struct HealthRegistry {
    records: Mutex<HashMap<SourceKey, SourceHealth>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn record_success(&self, key: SourceKey, latency: Duration) {
        let mut records = self.records.lock().expect("health registry poisoned");
        let record = records.entry(key).or_default();
        record.success_count += 1;
        record.total_latency_ms += latency.as_secs_f64() * 1000.0;
        record.last_success = Some(Utc::now());
    }

    pub fn record_failure(&self, key: SourceKey) {
        let mut records = self.records.lock().expect("health registry poisoned");
        let record = records.entry(key).or_default();
        record.failure_count += 1;
        record.last_failure = Some(Utc::now());
    }

    /// Copy of all records, sorted by key for stable reporting.
    pub fn snapshot(&self) -> Vec<(SourceKey, SourceHealth)> {
        let records = self.records.lock().expect("health registry poisoned");
        let mut entries: Vec<_> = records
            .iter()
            .map(|(key, record)| (*key, record.clone()))
            .collect();
        entries.sort_by_key(|(key, _)| key.to_string());
        entries
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trendpulse_common::{CountryCode, SourceKind};

    #[test]
    fn records_accumulate_per_key() {
        let registry = HealthRegistry::new();
        let key = SourceKey::new(SourceKind::OfficialApi, CountryCode::US);

        registry.record_success(key, Duration::from_millis(200));
        registry.record_success(key, Duration::from_millis(400));
        registry.record_failure(key);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        let (_, health) = &snapshot[0];
        assert_eq!(health.success_count, 2);
        assert_eq!(health.failure_count, 1);
        assert!((health.avg_latency_ms() - 300.0).abs() < 1e-9);
        assert!(health.last_success.is_some());
        assert!(health.last_failure.is_some());
    }

    #[test]
    fn avg_latency_is_zero_with_no_successes() {
        let health = SourceHealth::default();
        assert_eq!(health.avg_latency_ms(), 0.0);
    }
}
