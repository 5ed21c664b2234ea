use thiserror::Error;

pub type Result<T> = std::result::Result<T, HeadlessError>;

#[derive(Debug, Error)]
pub enum HeadlessError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Render timed out: {0}")]
    Timeout(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl From<reqwest::Error> for HeadlessError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HeadlessError::Timeout(err.to_string())
        } else {
            HeadlessError::Network(err.to_string())
        }
    }
}
