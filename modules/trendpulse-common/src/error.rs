use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CountryCode, DataType, SourceKind};

/// Failure classification shared by all source tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    Auth,
    RateLimit,
    Timeout,
    Parse,
    Unknown,
}

impl std::fmt::Display for SourceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceErrorKind::Auth => write!(f, "auth"),
            SourceErrorKind::RateLimit => write!(f, "rate_limit"),
            SourceErrorKind::Timeout => write!(f, "timeout"),
            SourceErrorKind::Parse => write!(f, "parse"),
            SourceErrorKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// A failure from one source tier. Recovered locally by advancing the
/// fallback chain; only surfaces inside `CollectError` when every tier and
/// the stale cache are exhausted.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{kind} error: {message}")]
pub struct SourceError {
    pub kind: SourceErrorKind,
    pub message: String,
}

impl SourceError {
    pub fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Auth, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::RateLimit, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Timeout, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Parse, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Unknown, message)
    }
}

/// Why a tier did not produce a result for this request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AttemptOutcome {
    /// Breaker refused the call; the tier was never attempted.
    CircuitOpen,
    /// The rate-limit wait would have exceeded the request deadline.
    RateLimited,
    /// The deadline had already passed before this tier came up.
    DeadlineExceeded,
    /// The call was made and failed.
    Failed(SourceError),
}

impl std::fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptOutcome::CircuitOpen => write!(f, "circuit open"),
            AttemptOutcome::RateLimited => write!(f, "rate limited past deadline"),
            AttemptOutcome::DeadlineExceeded => write!(f, "deadline exceeded"),
            AttemptOutcome::Failed(err) => write!(f, "{err}"),
        }
    }
}

/// Per-tier record carried on total exhaustion, for diagnosis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAttempt {
    pub source: SourceKind,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Error)]
pub enum CollectError {
    /// Every tier failed or was skipped, and no cached value existed.
    /// The caller is expected to retry on its next scheduled cycle.
    #[error("all sources exhausted for {data_type}/{country}: [{}]", format_attempts(.attempts))]
    AllSourcesExhausted {
        data_type: DataType,
        country: CountryCode,
        attempts: Vec<SourceAttempt>,
    },
}

fn format_attempts(attempts: &[SourceAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.source, a.outcome))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhaustion_error_lists_per_source_causes() {
        let err = CollectError::AllSourcesExhausted {
            data_type: DataType::Hashtags,
            country: CountryCode::US,
            attempts: vec![
                SourceAttempt {
                    source: SourceKind::OfficialApi,
                    outcome: AttemptOutcome::Failed(SourceError::rate_limit("quota exceeded")),
                },
                SourceAttempt {
                    source: SourceKind::CreativeCenter,
                    outcome: AttemptOutcome::CircuitOpen,
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("hashtags/US"));
        assert!(msg.contains("official_api: rate_limit error: quota exceeded"));
        assert!(msg.contains("creative_center: circuit open"));
    }
}
