// Test mocks for the collector pipeline.
//
// ScriptedSource implements TrendSource with a queued script of outcomes
// plus call accounting, so orchestrator tests can drive every fallback
// path without network or browser. Optional artificial latency cooperates
// with the paused test clock for deadline/timeout scenarios.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use trendpulse_common::{
    CollectionRequest, CountryCode, DataType, SourceError, SourceErrorKind, SourceKind, TrendItem,
};

use crate::traits::TrendSource;

enum Step {
    Items(Vec<TrendItem>),
    Fail(SourceErrorKind),
}

/// Scripted TrendSource. Builder pattern: `.then_items()`, `.then_error()`.
/// Calls past the end of the script fail with `Unknown`.
pub struct ScriptedSource {
    kind: SourceKind,
    script: Mutex<VecDeque<Step>>,
    calls: Mutex<u32>,
    latency: Option<Duration>,
}

impl ScriptedSource {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(0),
            latency: None,
        }
    }

    /// Queue a successful response with `count` generated items.
    pub fn then_items(self, count: usize) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Step::Items(trend_items(count)));
        self
    }

    /// Queue a failure of the given kind.
    pub fn then_error(self, kind: SourceErrorKind) -> Self {
        self.script.lock().unwrap().push_back(Step::Fail(kind));
        self
    }

    /// Sleep this long inside every fetch, to simulate a slow tier.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// How many times fetch was invoked.
    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl TrendSource for ScriptedSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self, request: &CollectionRequest) -> Result<Vec<TrendItem>, SourceError> {
        *self.calls.lock().unwrap() += 1;
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Items(items)) => Ok(items
                .into_iter()
                .take(request.limit as usize)
                .collect()),
            Some(Step::Fail(kind)) => Err(SourceError::new(kind, "scripted failure")),
            None => Err(SourceError::unknown("script exhausted")),
        }
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Generate `count` plausible trend items.
pub fn trend_items(count: usize) -> Vec<TrendItem> {
    (0..count)
        .map(|i| json!({ "name": format!("#trend{i}"), "rank": i }))
        .collect()
}

/// A hashtags request for the given country with the default 60s deadline.
pub fn hashtags_request(country: CountryCode) -> CollectionRequest {
    CollectionRequest::builder()
        .data_type(DataType::Hashtags)
        .country(country)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_source_replays_its_script_in_order() {
        let source = ScriptedSource::new(SourceKind::OfficialApi)
            .then_items(3)
            .then_error(SourceErrorKind::RateLimit);
        let request = hashtags_request(CountryCode::US);

        let first = source.fetch(&request).await.unwrap();
        assert_eq!(first.len(), 3);

        let second = source.fetch(&request).await.unwrap_err();
        assert_eq!(second.kind, SourceErrorKind::RateLimit);

        // Past the script's end: generic failure, calls still counted
        assert!(source.fetch(&request).await.is_err());
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn scripted_source_honors_the_request_limit() {
        let source = ScriptedSource::new(SourceKind::OfficialApi).then_items(100);
        let request = CollectionRequest::builder()
            .data_type(DataType::Hashtags)
            .country(CountryCode::US)
            .limit(10)
            .build();
        let items = source.fetch(&request).await.unwrap();
        assert_eq!(items.len(), 10);
    }
}
