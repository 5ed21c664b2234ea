// The three TrendSource adapters.
//
// Each wraps one upstream and translates its failure modes into the shared
// SourceError taxonomy. The orchestrator never sees which concrete client
// is behind the trait.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use tracing::{info, warn};

use headless_client::{HeadlessClient, HeadlessError};
use tiktok_api_client::{TikTokApiClient, TikTokApiError};
use trendpulse_common::{CollectionRequest, DataType, SourceError, SourceKind, TrendItem};

use crate::traits::TrendSource;

// ---------------------------------------------------------------------------
// Official API tier
// ---------------------------------------------------------------------------

pub struct OfficialApiSource {
    client: TikTokApiClient,
}

impl OfficialApiSource {
    pub fn new(client: TikTokApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TrendSource for OfficialApiSource {
    fn kind(&self) -> SourceKind {
        SourceKind::OfficialApi
    }

    async fn fetch(&self, request: &CollectionRequest) -> Result<Vec<TrendItem>, SourceError> {
        let country = request.country.as_str();
        let items = match request.data_type {
            DataType::Hashtags => self
                .client
                .query_trending_hashtags(country, request.limit)
                .await,
            DataType::Videos => self
                .client
                .query_trending_videos(country, request.limit)
                .await,
            // The research API exposes no creator/sound/trend listings;
            // those data types come from the scraping tiers.
            other => {
                return Err(SourceError::unknown(format!(
                    "{other} not available from the official API"
                )))
            }
        };
        items.map_err(map_api_error)
    }
}

fn map_api_error(err: TikTokApiError) -> SourceError {
    match err {
        TikTokApiError::Auth(msg) => SourceError::auth(msg),
        TikTokApiError::Api { status: 429, message } => SourceError::rate_limit(message),
        TikTokApiError::Api { status, message } => {
            SourceError::unknown(format!("HTTP {status}: {message}"))
        }
        TikTokApiError::Timeout(msg) => SourceError::timeout(msg),
        TikTokApiError::Network(msg) => SourceError::unknown(msg),
        TikTokApiError::Parse(msg) => SourceError::parse(msg),
    }
}

// ---------------------------------------------------------------------------
// Creative Center tier (plain HTTP against the listing endpoints)
// ---------------------------------------------------------------------------

const CREATIVE_CENTER_BASE: &str = "https://ads.tiktok.com/creative_radar_api/v1/popular_trend";

/// Response envelope on the listing endpoints. Only the envelope is
/// interpreted here; list entries pass through untouched.
#[derive(Debug, Deserialize)]
struct ListEnvelope {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: serde_json::Value,
}

pub struct CreativeCenterSource {
    client: reqwest::Client,
    base_url: String,
}

impl CreativeCenterSource {
    pub fn new() -> Self {
        Self::with_base_url(CREATIVE_CENTER_BASE)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn list_path(data_type: DataType) -> &'static str {
        match data_type {
            DataType::Hashtags => "hashtag/list",
            DataType::Videos => "video/list",
            DataType::Creators => "creator/list",
            DataType::Sounds => "sound/list",
            DataType::Trends => "trend/list",
        }
    }
}

impl Default for CreativeCenterSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrendSource for CreativeCenterSource {
    fn kind(&self) -> SourceKind {
        SourceKind::CreativeCenter
    }

    async fn fetch(&self, request: &CollectionRequest) -> Result<Vec<TrendItem>, SourceError> {
        let endpoint = format!("{}/{}", self.base_url, Self::list_path(request.data_type));
        let url = url::Url::parse_with_params(
            &endpoint,
            [
                ("page", "1"),
                ("limit", &request.limit.to_string()),
                ("country_code", request.country.as_str()),
            ],
        )
        .map_err(|e| SourceError::unknown(format!("bad listing URL: {e}")))?;

        info!(%url, "Fetching trend listing");
        let resp = self
            .client
            .get(url)
            .header("Referer", "https://ads.tiktok.com/business/creativecenter/")
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = resp.status();
        match status.as_u16() {
            401 | 403 => {
                let body = resp.text().await.unwrap_or_default();
                return Err(SourceError::auth(body));
            }
            429 => return Err(SourceError::rate_limit("listing endpoint throttled")),
            _ if !status.is_success() => {
                let body = resp.text().await.unwrap_or_default();
                return Err(SourceError::unknown(format!("HTTP {status}: {body}")));
            }
            _ => {}
        }

        let body = resp.text().await.map_err(map_reqwest_error)?;
        unwrap_list_envelope(&body, request.limit as usize)
    }
}

/// Parse the listing envelope and extract `data.list`.
fn unwrap_list_envelope(body: &str, limit: usize) -> Result<Vec<TrendItem>, SourceError> {
    let envelope: ListEnvelope =
        serde_json::from_str(body).map_err(|e| SourceError::parse(format!("bad envelope: {e}")))?;
    if envelope.code != 0 {
        return Err(SourceError::unknown(format!(
            "listing endpoint code {}: {}",
            envelope.code, envelope.msg
        )));
    }
    let list = envelope
        .data
        .get("list")
        .and_then(|v| v.as_array())
        .ok_or_else(|| SourceError::parse("envelope data has no list array"))?;
    Ok(list.iter().take(limit).cloned().collect())
}

fn map_reqwest_error(err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::timeout(err.to_string())
    } else {
        SourceError::unknown(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Headless tier (rendered page, last resort before the cache)
// ---------------------------------------------------------------------------

/// Max attempts against the rendering service for transient failures.
const HEADLESS_MAX_ATTEMPTS: u32 = 3;
/// Base backoff between attempts. Actual delay is base * 2^attempt + jitter.
const HEADLESS_RETRY_BASE: Duration = Duration::from_secs(2);

const TREND_PAGE_BASE: &str = "https://ads.tiktok.com/business/creativecenter/inspiration/popular";

pub struct HeadlessSource {
    client: HeadlessClient,
}

impl HeadlessSource {
    pub fn new(client: HeadlessClient) -> Self {
        Self { client }
    }

    fn page_segment(data_type: DataType) -> &'static str {
        match data_type {
            DataType::Hashtags | DataType::Trends => "hashtag",
            DataType::Videos => "video",
            DataType::Creators => "creator",
            DataType::Sounds => "music",
        }
    }
}

#[async_trait]
impl TrendSource for HeadlessSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Headless
    }

    async fn fetch(&self, request: &CollectionRequest) -> Result<Vec<TrendItem>, SourceError> {
        let url = format!(
            "{TREND_PAGE_BASE}/{}/pc/en?country_code={}",
            Self::page_segment(request.data_type),
            request.country.as_str()
        );

        let mut last_error = SourceError::unknown("render never attempted");
        for attempt in 0..HEADLESS_MAX_ATTEMPTS {
            match self.client.content(&url).await {
                Ok(html) if html.is_empty() => {
                    last_error = SourceError::unknown("empty render output");
                    warn!(url, attempt = attempt + 1, "Empty render, retrying after backoff");
                }
                Ok(html) => return extract_embedded_items(&html, request.limit as usize),
                Err(HeadlessError::Api { status: 401, message })
                | Err(HeadlessError::Api { status: 403, message }) => {
                    return Err(SourceError::auth(message));
                }
                Err(HeadlessError::Api { status: 429, message }) => {
                    return Err(SourceError::rate_limit(message));
                }
                Err(HeadlessError::Api { status, message }) => {
                    return Err(SourceError::unknown(format!("HTTP {status}: {message}")));
                }
                Err(HeadlessError::Timeout(msg)) => {
                    last_error = SourceError::timeout(msg);
                    warn!(url, attempt = attempt + 1, "Render timed out, retrying after backoff");
                }
                Err(HeadlessError::Network(msg)) => {
                    last_error = SourceError::unknown(msg);
                    warn!(url, attempt = attempt + 1, "Render transport error, retrying after backoff");
                }
            }

            if attempt + 1 < HEADLESS_MAX_ATTEMPTS {
                let backoff = HEADLESS_RETRY_BASE * 2u32.pow(attempt);
                let jitter = Duration::from_millis(rand::rng().random_range(0..500));
                tokio::time::sleep(backoff + jitter).await;
            }
        }
        Err(last_error)
    }
}

/// Pull the Next.js state blob out of rendered HTML and return the first
/// non-empty trend list inside it. Interpreting the entries is downstream's
/// concern.
fn extract_embedded_items(html: &str, limit: usize) -> Result<Vec<TrendItem>, SourceError> {
    const MARKER: &str = r#"<script id="__NEXT_DATA__" type="application/json">"#;
    let start = html
        .find(MARKER)
        .ok_or_else(|| SourceError::parse("no embedded state blob in rendered page"))?
        + MARKER.len();
    let end = html[start..]
        .find("</script>")
        .ok_or_else(|| SourceError::parse("unterminated state blob"))?
        + start;
    let state: serde_json::Value = serde_json::from_str(&html[start..end])
        .map_err(|e| SourceError::parse(format!("state blob is not valid JSON: {e}")))?;

    let mut items = Vec::new();
    first_list(&state, &mut items, limit);
    if items.is_empty() {
        return Err(SourceError::parse("state blob holds no trend list"));
    }
    Ok(items)
}

/// Depth-first search for the first non-empty array under a "list" key.
fn first_list(value: &serde_json::Value, out: &mut Vec<TrendItem>, limit: usize) {
    if !out.is_empty() {
        return;
    }
    match value {
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::Array(list)) = map.get("list") {
                if !list.is_empty() {
                    out.extend(list.iter().take(limit).cloned());
                    return;
                }
            }
            for nested in map.values() {
                first_list(nested, out, limit);
                if !out.is_empty() {
                    return;
                }
            }
        }
        serde_json::Value::Array(values) => {
            for nested in values {
                first_list(nested, out, limit);
                if !out.is_empty() {
                    return;
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trendpulse_common::SourceErrorKind;

    #[test]
    fn api_errors_map_onto_the_shared_taxonomy() {
        let cases = [
            (TikTokApiError::Auth("bad key".into()), SourceErrorKind::Auth),
            (
                TikTokApiError::Api {
                    status: 429,
                    message: "slow down".into(),
                },
                SourceErrorKind::RateLimit,
            ),
            (
                TikTokApiError::Api {
                    status: 500,
                    message: "oops".into(),
                },
                SourceErrorKind::Unknown,
            ),
            (
                TikTokApiError::Timeout("deadline".into()),
                SourceErrorKind::Timeout,
            ),
            (
                TikTokApiError::Parse("bad json".into()),
                SourceErrorKind::Parse,
            ),
        ];
        for (input, expected) in cases {
            assert_eq!(map_api_error(input).kind, expected);
        }
    }

    #[test]
    fn list_envelope_unwraps_items() {
        let body = r##"{"code":0,"msg":"ok","data":{"list":[{"name":"#a"},{"name":"#b"},{"name":"#c"}]}}"##;
        let items = unwrap_list_envelope(body, 2).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["name"], "#a");
    }

    #[test]
    fn list_envelope_rejects_error_codes() {
        let body = r#"{"code":40101,"msg":"not authorized","data":{}}"#;
        let err = unwrap_list_envelope(body, 10).unwrap_err();
        assert_eq!(err.kind, SourceErrorKind::Unknown);
        assert!(err.message.contains("40101"));
    }

    #[test]
    fn embedded_state_extraction_finds_the_trend_list() {
        let html = format!(
            r#"<html><body><script id="__NEXT_DATA__" type="application/json">{}</script></body></html>"#,
            r##"{"props":{"pageProps":{"trendData":{"list":[{"name":"#x","rank":1},{"name":"#y","rank":2}]}}}}"##
        );
        let items = extract_embedded_items(&html, 50).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["name"], "#y");
    }

    #[test]
    fn pages_without_a_state_blob_are_a_parse_error() {
        let err = extract_embedded_items("<html><body>login required</body></html>", 50).unwrap_err();
        assert_eq!(err.kind, SourceErrorKind::Parse);
    }

    #[test]
    fn empty_trend_lists_are_a_parse_error() {
        let html = r#"<script id="__NEXT_DATA__" type="application/json">{"props":{"list":[]}}</script>"#;
        let err = extract_embedded_items(html, 50).unwrap_err();
        assert_eq!(err.kind, SourceErrorKind::Parse);
    }
}
