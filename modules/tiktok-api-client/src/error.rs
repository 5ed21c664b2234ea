use thiserror::Error;

pub type Result<T> = std::result::Result<T, TikTokApiError>;

#[derive(Debug, Error)]
pub enum TikTokApiError {
    #[error("Auth error: {0}")]
    Auth(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for TikTokApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TikTokApiError::Timeout(err.to_string())
        } else {
            TikTokApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TikTokApiError {
    fn from(err: serde_json::Error) -> Self {
        TikTokApiError::Parse(err.to_string())
    }
}
