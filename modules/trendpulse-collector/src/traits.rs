// Trait abstraction over the three upstream tiers.
//
// The orchestrator treats the official API, the Creative Center scraper,
// and the headless renderer identically through this one contract; tier
// selection is configuration, never runtime type inspection.
//
// Enables deterministic testing with ScriptedSource: no network, no
// browser. `cargo test` in seconds.

use async_trait::async_trait;

use trendpulse_common::{CollectionRequest, SourceError, SourceKind, TrendItem};

#[async_trait]
pub trait TrendSource: Send + Sync {
    /// Which tier this source implements.
    fn kind(&self) -> SourceKind;

    /// Fetch one batch of trend items for the request's country and data
    /// type. Item payloads are opaque; an error classifies the failure for
    /// the breaker and the exhaustion report.
    async fn fetch(&self, request: &CollectionRequest) -> Result<Vec<TrendItem>, SourceError>;
}
