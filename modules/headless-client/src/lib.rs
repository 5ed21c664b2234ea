pub mod error;

pub use error::{HeadlessError, Result};

use std::time::Duration;

use serde::Serialize;

/// Default in-browser navigation timeout, in milliseconds.
const DEFAULT_NAV_TIMEOUT_MS: u64 = 20_000;

#[derive(Debug, Serialize)]
struct ContentRequest<'a> {
    url: &'a str,
    #[serde(rename = "gotoOptions")]
    goto_options: GotoOptions,
}

#[derive(Debug, Serialize)]
struct GotoOptions {
    timeout: u64,
    #[serde(rename = "waitUntil")]
    wait_until: &'static str,
}

pub struct HeadlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    nav_timeout_ms: u64,
}

impl HeadlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        // HTTP timeout sits above the navigation timeout so the service can
        // report its own failures instead of the socket dying first.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(45))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
            nav_timeout_ms: DEFAULT_NAV_TIMEOUT_MS,
        }
    }

    pub fn with_nav_timeout(mut self, timeout: Duration) -> Self {
        self.nav_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Fetch fully-rendered HTML for a URL via the /content endpoint.
    /// JS has run and the page has settled (networkidle2) before return.
    pub async fn content(&self, url: &str) -> Result<String> {
        let mut endpoint = format!("{}/content", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }

        let body = ContentRequest {
            url,
            goto_options: GotoOptions {
                timeout: self.nav_timeout_ms,
                wait_until: "networkidle2",
            },
        };

        tracing::debug!(url, "Requesting rendered content");
        let resp = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(HeadlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }
}
