//! Per-(source, country) circuit breaker.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: tier assumed down, calls refused without touching the source
//! - HalfOpen: cooldown elapsed, a single trial call probes recovery
//!
//! The cooldown doubles on every failed trial, up to a configured ceiling,
//! and resets to the base value once a trial succeeds. Exactly one caller
//! is admitted as the trial: the one that observes cooldown expiry flips
//! the entry to HalfOpen under the entry lock; everyone else sees the
//! in-flight trial and is refused as if the circuit were still open.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use trendpulse_common::{CollectorConfig, SourceKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct BreakerEntry {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Instant,
    cooldown: Duration,
    trial_in_flight: bool,
}

impl BreakerEntry {
    fn new(base_cooldown: Duration) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: Instant::now(),
            cooldown: base_cooldown,
            trial_in_flight: false,
        }
    }
}

pub struct CircuitBreaker {
    entries: Mutex<HashMap<SourceKey, Arc<Mutex<BreakerEntry>>>>,
    failure_threshold: u32,
    base_cooldown: Duration,
    max_cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(config: &CollectorConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            failure_threshold: config.failure_threshold,
            base_cooldown: config.base_cooldown,
            max_cooldown: config.max_cooldown,
        }
    }

    fn entry(&self, key: SourceKey) -> Arc<Mutex<BreakerEntry>> {
        let mut entries = self.entries.lock().expect("breaker registry poisoned");
        entries
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(BreakerEntry::new(self.base_cooldown))))
            .clone()
    }

    /// May this key be called right now? An Open circuit whose cooldown has
    /// elapsed admits the asking caller as the single HalfOpen trial.
    pub fn allow(&self, key: SourceKey) -> bool {
        let entry = self.entry(key);
        let mut entry = entry.lock().expect("breaker entry poisoned");
        match entry.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if Instant::now().duration_since(entry.opened_at) >= entry.cooldown {
                    entry.state = CircuitState::HalfOpen;
                    entry.trial_in_flight = true;
                    info!(key = %key, "Circuit half-open, admitting trial call");
                    true
                } else {
                    debug!(key = %key, "Circuit open, failing fast");
                    false
                }
            }
            CircuitState::HalfOpen => {
                if entry.trial_in_flight {
                    false
                } else {
                    entry.trial_in_flight = true;
                    true
                }
            }
        }
    }

    pub fn record_success(&self, key: SourceKey) {
        let entry = self.entry(key);
        let mut entry = entry.lock().expect("breaker entry poisoned");
        match entry.state {
            CircuitState::Closed => entry.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                info!(key = %key, "Trial succeeded, circuit closed");
                entry.state = CircuitState::Closed;
                entry.consecutive_failures = 0;
                entry.cooldown = self.base_cooldown;
                entry.trial_in_flight = false;
            }
            // A success reported while Open comes from a call that was
            // already in flight when the circuit tripped; the next trial
            // will confirm recovery.
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self, key: SourceKey) {
        let entry = self.entry(key);
        let mut entry = entry.lock().expect("breaker entry poisoned");
        match entry.state {
            CircuitState::Closed => {
                entry.consecutive_failures += 1;
                if entry.consecutive_failures >= self.failure_threshold {
                    entry.state = CircuitState::Open;
                    entry.opened_at = Instant::now();
                    warn!(
                        key = %key,
                        failures = entry.consecutive_failures,
                        cooldown_secs = entry.cooldown.as_secs(),
                        "Circuit opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                entry.state = CircuitState::Open;
                entry.opened_at = Instant::now();
                entry.cooldown = (entry.cooldown * 2).min(self.max_cooldown);
                entry.trial_in_flight = false;
                warn!(
                    key = %key,
                    cooldown_secs = entry.cooldown.as_secs(),
                    "Trial failed, circuit re-opened with doubled cooldown"
                );
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self, key: SourceKey) -> CircuitState {
        self.entry(key).lock().expect("breaker entry poisoned").state
    }

    pub fn failure_count(&self, key: SourceKey) -> u32 {
        self.entry(key)
            .lock()
            .expect("breaker entry poisoned")
            .consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;
    use trendpulse_common::{CountryCode, SourceKind};

    fn breaker() -> CircuitBreaker {
        // threshold 3, base cooldown 30s, cap 600s
        CircuitBreaker::new(&CollectorConfig::default())
    }

    fn key() -> SourceKey {
        SourceKey::new(SourceKind::OfficialApi, CountryCode::US)
    }

    #[tokio::test(start_paused = true)]
    async fn trips_at_exactly_the_threshold_never_earlier() {
        let breaker = breaker();
        let k = key();

        breaker.record_failure(k);
        breaker.record_failure(k);
        assert_eq!(breaker.state(k), CircuitState::Closed);
        assert!(breaker.allow(k));

        breaker.record_failure(k);
        assert_eq!(breaker.state(k), CircuitState::Open);
        assert!(!breaker.allow(k));
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_the_failure_count_while_closed() {
        let breaker = breaker();
        let k = key();

        breaker.record_failure(k);
        breaker.record_failure(k);
        breaker.record_success(k);
        assert_eq!(breaker.failure_count(k), 0);

        // Two more failures are again below the threshold
        breaker.record_failure(k);
        breaker.record_failure(k);
        assert_eq!(breaker.state(k), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_expiry_admits_exactly_one_trial() {
        let breaker = breaker();
        let k = key();

        for _ in 0..3 {
            breaker.record_failure(k);
        }
        assert!(!breaker.allow(k));

        advance(Duration::from_secs(30)).await;

        // A burst of racing callers: only the first gets through
        let admitted = (0..8).filter(|_| breaker.allow(k)).count();
        assert_eq!(admitted, 1);
        assert_eq!(breaker.state(k), CircuitState::HalfOpen);

        // Trial resolves successfully: circuit closes for everyone
        breaker.record_success(k);
        assert_eq!(breaker.state(k), CircuitState::Closed);
        assert!(breaker.allow(k));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_trial_doubles_the_cooldown() {
        let breaker = breaker();
        let k = key();

        for _ in 0..3 {
            breaker.record_failure(k);
        }

        // First cooldown: 30s
        advance(Duration::from_secs(30)).await;
        assert!(breaker.allow(k));
        breaker.record_failure(k);
        assert_eq!(breaker.state(k), CircuitState::Open);

        // Second cooldown is 60s: not yet at 59s, open at 60s
        advance(Duration::from_secs(59)).await;
        assert!(!breaker.allow(k));
        advance(Duration::from_secs(1)).await;
        assert!(breaker.allow(k));

        // Succeeding trial resets the cooldown to the base value
        breaker.record_success(k);
        for _ in 0..3 {
            breaker.record_failure(k);
        }
        advance(Duration::from_secs(30)).await;
        assert!(breaker.allow(k));
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_doubling_is_capped() {
        let breaker = breaker();
        let k = key();

        for _ in 0..3 {
            breaker.record_failure(k);
        }

        // Fail enough trials to push doubling well past the 600s ceiling
        for _ in 0..8 {
            advance(Duration::from_secs(600)).await;
            assert!(breaker.allow(k), "cooldown exceeded the configured cap");
            breaker.record_failure(k);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let breaker = breaker();
        let us = key();
        let de = SourceKey::new(SourceKind::OfficialApi, CountryCode::DE);

        for _ in 0..3 {
            breaker.record_failure(us);
        }
        assert!(!breaker.allow(us));
        assert!(breaker.allow(de));
        assert_eq!(breaker.failure_count(de), 0);
    }
}
