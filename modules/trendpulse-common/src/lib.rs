pub mod config;
pub mod error;
pub mod types;

pub use config::{CollectorConfig, Credentials, RateTier};
pub use error::{AttemptOutcome, CollectError, SourceAttempt, SourceError, SourceErrorKind};
pub use types::{
    CollectionRequest, CollectionResult, CountryCode, DataType, NicheType, SourceKey, SourceKind,
    TrendItem,
};
