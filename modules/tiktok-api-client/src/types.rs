use serde::{Deserialize, Serialize};

/// Response from the OAuth2 client-credentials token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Seconds until the token expires.
    pub expires_in: u64,
}

/// Body for a trend query endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct TrendQuery {
    pub country_code: String,
    pub max_count: u32,
}

/// Standard response envelope: payload under `data`, status under `error`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub data: serde_json::Value,
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub log_id: String,
}

impl ApiErrorBody {
    /// The API reports success as an error object with code "ok".
    pub fn is_ok(&self) -> bool {
        self.code == "ok"
    }
}
