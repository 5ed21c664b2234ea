use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use headless_client::HeadlessClient;
use tiktok_api_client::TikTokApiClient;
use trendpulse_collector::cache::ResponseCache;
use trendpulse_collector::circuit::CircuitBreaker;
use trendpulse_collector::collector::TrendCollector;
use trendpulse_collector::health::HealthRegistry;
use trendpulse_collector::rate_limit::RateLimiter;
use trendpulse_collector::sources::{CreativeCenterSource, HeadlessSource, OfficialApiSource};
use trendpulse_collector::traits::TrendSource;
use trendpulse_common::{
    CollectionRequest, CollectorConfig, CountryCode, Credentials, DataType, SourceKind,
};

/// Run one collection cycle for a set of countries.
#[derive(Parser, Debug)]
#[command(name = "trendpulse-collector")]
struct Cli {
    /// Countries to collect, comma-separated (e.g. US,BR,DE).
    #[arg(long, value_delimiter = ',', default_value = "US")]
    countries: Vec<CountryCode>,

    /// What to collect: hashtags, videos, creators, sounds, trends.
    #[arg(long, default_value = "hashtags")]
    data_type: DataType,

    /// Max items per country.
    #[arg(long, default_value_t = 50)]
    limit: u32,

    /// Overall per-country deadline in seconds.
    #[arg(long, default_value_t = 60)]
    deadline_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("trendpulse=info".parse()?))
        .init();

    let cli = Cli::parse();
    let run_id = uuid::Uuid::new_v4();
    info!(%run_id, countries = cli.countries.len(), data_type = %cli.data_type, "TrendPulse collector starting");

    let credentials = Credentials::from_env();
    let config = CollectorConfig::default();

    let sources: Vec<Arc<dyn TrendSource>> = config
        .priority
        .iter()
        .map(|kind| -> Arc<dyn TrendSource> {
            match kind {
                SourceKind::OfficialApi => Arc::new(OfficialApiSource::new(TikTokApiClient::new(
                    credentials.tiktok_client_key.clone(),
                    credentials.tiktok_client_secret.clone(),
                ))),
                SourceKind::CreativeCenter => Arc::new(CreativeCenterSource::new()),
                SourceKind::Headless => Arc::new(HeadlessSource::new(HeadlessClient::new(
                    &credentials.headless_url,
                    credentials.headless_token.as_deref(),
                ))),
            }
        })
        .collect();

    let collector = Arc::new(TrendCollector::new(
        sources,
        Arc::new(RateLimiter::new(&config)),
        Arc::new(CircuitBreaker::new(&config)),
        Arc::new(ResponseCache::new(&config)),
        Arc::new(HealthRegistry::new()),
        &config,
    ));

    // One independent collection per country; no ordering across them.
    let runs = cli.countries.iter().map(|&country| {
        let collector = collector.clone();
        let request = CollectionRequest::builder()
            .data_type(cli.data_type)
            .country(country)
            .limit(cli.limit)
            .deadline(Duration::from_secs(cli.deadline_secs))
            .build();
        async move { (country, collector.collect(request).await) }
    });

    let mut failures = 0usize;
    for (country, outcome) in futures::future::join_all(runs).await {
        match outcome {
            Ok(result) => info!(
                %country,
                items = result.items.len(),
                source = result.source.map(|s| s.to_string()).unwrap_or_else(|| "cache".to_string()),
                stale = result.is_stale,
                "Collection complete"
            ),
            Err(err) => {
                failures += 1;
                warn!(%country, error = %err, "Collection failed; will retry next cycle");
            }
        }
    }

    for (key, health) in collector.health_snapshot() {
        info!(
            key = %key,
            successes = health.success_count,
            failures = health.failure_count,
            avg_latency_ms = format!("{:.0}", health.avg_latency_ms()),
            "Source health"
        );
    }

    info!(%run_id, failures, "TrendPulse collector finished");
    Ok(())
}
