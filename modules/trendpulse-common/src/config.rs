use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::types::{CountryCode, DataType, SourceKind};

/// Rate-limit tier for one country: sustained rate plus burst headroom.
#[derive(Debug, Clone, Copy)]
pub struct RateTier {
    pub requests_per_minute: u32,
    pub burst_capacity: u32,
}

impl RateTier {
    /// Tier with the conventional burst headroom of twice the sustained rate.
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            burst_capacity: requests_per_minute * 2,
        }
    }

    pub fn with_burst(requests_per_minute: u32, burst_capacity: u32) -> Self {
        Self {
            requests_per_minute,
            burst_capacity,
        }
    }

    /// Sustained refill rate in tokens per second.
    pub fn refill_per_sec(&self) -> f64 {
        f64::from(self.requests_per_minute) / 60.0
    }
}

/// Tuning for the whole acquisition pipeline. All thresholds live here;
/// none of the component code hardcodes them.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Fixed tier priority. Never reordered at runtime — health data informs
    /// observability, not routing.
    pub priority: Vec<SourceKind>,

    /// Per-country rate-limit tiers; countries not listed get `default_tier`.
    pub rate_tiers: HashMap<CountryCode, RateTier>,
    pub default_tier: RateTier,
    /// Token cost per request by data type. Listing endpoints that are
    /// heavier upstream cost more tokens per call.
    pub token_costs: HashMap<DataType, f64>,

    /// Consecutive failures that trip a breaker CLOSED -> OPEN.
    pub failure_threshold: u32,
    /// First OPEN cooldown; doubles on each failed HALF_OPEN trial.
    pub base_cooldown: Duration,
    /// Ceiling for the doubling cooldown.
    pub max_cooldown: Duration,

    /// Freshness window per data type; `default_ttl` covers the rest.
    pub cache_ttls: HashMap<DataType, Duration>,
    pub default_ttl: Duration,
    /// Optional hard age limit for stale reads. `None` means a stale entry
    /// is served no matter how old it is.
    pub max_stale_age: Option<Duration>,

    /// Per-tier call timeout. The request deadline bounds the whole
    /// collection on top of this.
    pub call_timeout: Duration,
    /// Deadline applied when a request does not set one.
    pub default_deadline: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        // Main markets get the high tier; everything else the standard one.
        let mut rate_tiers = HashMap::new();
        for country in [
            CountryCode::US,
            CountryCode::BR,
            CountryCode::MX,
            CountryCode::ID,
        ] {
            rate_tiers.insert(country, RateTier::new(600));
        }
        for country in [
            CountryCode::GB,
            CountryCode::CA,
            CountryCode::AU,
            CountryCode::DE,
            CountryCode::FR,
            CountryCode::IT,
            CountryCode::ES,
            CountryCode::JP,
        ] {
            rate_tiers.insert(country, RateTier::new(300));
        }

        let mut token_costs = HashMap::new();
        token_costs.insert(DataType::Hashtags, 1.0);
        token_costs.insert(DataType::Videos, 1.25);
        token_costs.insert(DataType::Creators, 1.1);
        token_costs.insert(DataType::Sounds, 1.4);
        token_costs.insert(DataType::Trends, 0.8);

        // Scraped listings refresh slowly upstream, so they stay fresh
        // longer than live trend queries.
        let mut cache_ttls = HashMap::new();
        cache_ttls.insert(DataType::Hashtags, Duration::from_secs(3600));
        cache_ttls.insert(DataType::Videos, Duration::from_secs(1800));
        cache_ttls.insert(DataType::Creators, Duration::from_secs(1800));
        cache_ttls.insert(DataType::Sounds, Duration::from_secs(1800));
        cache_ttls.insert(DataType::Trends, Duration::from_secs(900));

        Self {
            priority: vec![
                SourceKind::OfficialApi,
                SourceKind::CreativeCenter,
                SourceKind::Headless,
            ],
            rate_tiers,
            default_tier: RateTier::new(300),
            token_costs,
            failure_threshold: 3,
            base_cooldown: Duration::from_secs(30),
            max_cooldown: Duration::from_secs(600),
            cache_ttls,
            default_ttl: Duration::from_secs(1800),
            max_stale_age: None,
            call_timeout: Duration::from_secs(30),
            default_deadline: Duration::from_secs(60),
        }
    }
}

impl CollectorConfig {
    pub fn tier_for(&self, country: CountryCode) -> RateTier {
        self.rate_tiers
            .get(&country)
            .copied()
            .unwrap_or(self.default_tier)
    }

    pub fn ttl_for(&self, data_type: DataType) -> Duration {
        self.cache_ttls
            .get(&data_type)
            .copied()
            .unwrap_or(self.default_ttl)
    }

    pub fn cost_for(&self, data_type: DataType) -> f64 {
        self.token_costs.get(&data_type).copied().unwrap_or(1.0)
    }
}

/// Upstream credentials and endpoints, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub tiktok_client_key: String,
    pub tiktok_client_secret: String,
    pub headless_url: String,
    pub headless_token: Option<String>,
}

impl Credentials {
    /// Load credentials from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            tiktok_client_key: required_env("TIKTOK_CLIENT_KEY"),
            tiktok_client_secret: required_env("TIKTOK_CLIENT_SECRET"),
            headless_url: env::var("HEADLESS_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            headless_token: env::var("HEADLESS_TOKEN").ok(),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
