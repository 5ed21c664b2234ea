pub mod error;
pub mod types;

pub use error::{Result, TikTokApiError};
pub use types::{ApiErrorBody, ApiResponse, TokenResponse, TrendQuery};

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

const BASE_URL: &str = "https://open.tiktokapis.com/v2";

/// Path for the OAuth2 client-credentials exchange.
const TOKEN_PATH: &str = "/oauth/token/";

/// Refresh the cached token this long before its reported expiry.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

pub struct TikTokApiClient {
    client: reqwest::Client,
    client_key: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl TikTokApiClient {
    pub fn new(client_key: String, client_secret: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            client_key,
            client_secret,
            token: Mutex::new(None),
        }
    }

    /// Get a bearer token, exchanging client credentials only when the
    /// cached one is missing or about to expire.
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(ref token) = *cached {
            if token.expires_at > Instant::now() + TOKEN_EXPIRY_MARGIN {
                return Ok(token.access_token.clone());
            }
        }

        tracing::debug!("Exchanging client credentials for access token");
        let resp = self
            .client
            .post(format!("{BASE_URL}{TOKEN_PATH}"))
            .form(&[
                ("client_key", self.client_key.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            let body = resp.text().await.unwrap_or_default();
            return Err(TikTokApiError::Auth(body));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TikTokApiError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let token: TokenResponse = resp.json().await?;
        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(access_token)
    }

    /// POST a query endpoint and unwrap the item array from the envelope.
    /// Item payloads are passed through unparsed.
    async fn query(&self, path: &str, query: &TrendQuery) -> Result<Vec<serde_json::Value>> {
        let token = self.access_token().await?;

        let resp = self
            .client
            .post(format!("{BASE_URL}{path}"))
            .bearer_auth(token)
            .json(query)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            let body = resp.text().await.unwrap_or_default();
            return Err(TikTokApiError::Auth(body));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TikTokApiError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let api_resp: ApiResponse = resp.json().await?;
        if let Some(err) = api_resp.error {
            if !err.is_ok() {
                return Err(TikTokApiError::Api {
                    status: status.as_u16(),
                    message: format!("{} ({}, log_id {})", err.message, err.code, err.log_id),
                });
            }
        }

        let items = api_resp
            .data
            .get("items")
            .and_then(|v| v.as_array())
            .cloned()
            .ok_or_else(|| {
                TikTokApiError::Parse("response data has no items array".to_string())
            })?;
        Ok(items)
    }

    /// Query trending hashtags for a country.
    pub async fn query_trending_hashtags(
        &self,
        country_code: &str,
        limit: u32,
    ) -> Result<Vec<serde_json::Value>> {
        tracing::info!(country_code, limit, "Querying trending hashtags");
        let query = TrendQuery {
            country_code: country_code.to_string(),
            max_count: limit,
        };
        let items = self.query("/research/trend/hashtag/", &query).await?;
        tracing::info!(count = items.len(), "Fetched trending hashtags");
        Ok(items)
    }

    /// Query trending videos for a country.
    pub async fn query_trending_videos(
        &self,
        country_code: &str,
        limit: u32,
    ) -> Result<Vec<serde_json::Value>> {
        tracing::info!(country_code, limit, "Querying trending videos");
        let query = TrendQuery {
            country_code: country_code.to_string(),
            max_count: limit,
        };
        let items = self.query("/research/video/query/", &query).await?;
        tracing::info!(count = items.len(), "Fetched trending videos");
        Ok(items)
    }
}
