use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// A single trend entry as returned by a source. Payload interpretation
/// (hashtag stats, sound metadata, ...) belongs to downstream consumers;
/// the pipeline moves items through opaquely.
pub type TrendItem = serde_json::Value;

// --- Enums ---

/// Markets the pipeline collects for. ISO 3166-1 alpha-2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CountryCode {
    US,
    BR,
    MX,
    ID,
    PH,
    VN,
    PK,
    BD,
    EG,
    NG,
    TH,
    JP,
    GB,
    CA,
    AU,
    DE,
    FR,
    IT,
    ES,
}

impl CountryCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountryCode::US => "US",
            CountryCode::BR => "BR",
            CountryCode::MX => "MX",
            CountryCode::ID => "ID",
            CountryCode::PH => "PH",
            CountryCode::VN => "VN",
            CountryCode::PK => "PK",
            CountryCode::BD => "BD",
            CountryCode::EG => "EG",
            CountryCode::NG => "NG",
            CountryCode::TH => "TH",
            CountryCode::JP => "JP",
            CountryCode::GB => "GB",
            CountryCode::CA => "CA",
            CountryCode::AU => "AU",
            CountryCode::DE => "DE",
            CountryCode::FR => "FR",
            CountryCode::IT => "IT",
            CountryCode::ES => "ES",
        }
    }
}

impl std::fmt::Display for CountryCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CountryCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "US" => Ok(CountryCode::US),
            "BR" => Ok(CountryCode::BR),
            "MX" => Ok(CountryCode::MX),
            "ID" => Ok(CountryCode::ID),
            "PH" => Ok(CountryCode::PH),
            "VN" => Ok(CountryCode::VN),
            "PK" => Ok(CountryCode::PK),
            "BD" => Ok(CountryCode::BD),
            "EG" => Ok(CountryCode::EG),
            "NG" => Ok(CountryCode::NG),
            "TH" => Ok(CountryCode::TH),
            "JP" => Ok(CountryCode::JP),
            "GB" => Ok(CountryCode::GB),
            "CA" => Ok(CountryCode::CA),
            "AU" => Ok(CountryCode::AU),
            "DE" => Ok(CountryCode::DE),
            "FR" => Ok(CountryCode::FR),
            "IT" => Ok(CountryCode::IT),
            "ES" => Ok(CountryCode::ES),
            other => Err(format!("Unknown country code: {other}")),
        }
    }
}

/// What kind of trend listing a request asks for. Doubles as the cache-TTL
/// and token-cost key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Hashtags,
    Videos,
    Creators,
    Sounds,
    Trends,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Hashtags => "hashtags",
            DataType::Videos => "videos",
            DataType::Creators => "creators",
            DataType::Sounds => "sounds",
            DataType::Trends => "trends",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hashtags" => Ok(DataType::Hashtags),
            "videos" => Ok(DataType::Videos),
            "creators" => Ok(DataType::Creators),
            "sounds" => Ok(DataType::Sounds),
            "trends" => Ok(DataType::Trends),
            other => Err(format!("Unknown data type: {other}")),
        }
    }
}

/// Content niche filter. Opaque to the pipeline — it only narrows requests
/// and distinguishes cache entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NicheType {
    Booktok,
    Healthtok,
    Diytok,
    Gamingtok,
    Financetok,
    Musictok,
    Comedytok,
    Activismtok,
    Foodtok,
    Beautytok,
    Fashiontok,
    Dancetok,
    Commercetok,
    Educationtok,
    Lifestyletok,
    Traveltok,
    Entertainmenttok,
    Arttok,
    Entrepreneurtok,
}

/// The three upstream tiers, in their usual priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    OfficialApi,
    CreativeCenter,
    Headless,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::OfficialApi => write!(f, "official_api"),
            SourceKind::CreativeCenter => write!(f, "creative_center"),
            SourceKind::Headless => write!(f, "headless"),
        }
    }
}

/// Key for per-source, per-country shared state (rate-limit buckets,
/// breaker entries, health records).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceKey {
    pub source: SourceKind,
    pub country: CountryCode,
}

impl SourceKey {
    pub fn new(source: SourceKind, country: CountryCode) -> Self {
        Self { source, country }
    }
}

impl std::fmt::Display for SourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.source, self.country)
    }
}

// --- Request / Result ---

/// One collection request. Immutable once built; owned by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct CollectionRequest {
    pub data_type: DataType,
    pub country: CountryCode,
    #[builder(default)]
    pub niche: Option<NicheType>,
    #[builder(default = 50)]
    pub limit: u32,
    /// Overall wall-clock budget across all tiers, measured from the moment
    /// `collect` is entered. Each tier call additionally has its own shorter
    /// timeout.
    #[builder(default = Duration::from_secs(60))]
    pub deadline: Duration,
}

/// What a collection produced. `source` is `None` when the items came from
/// the cache (fresh or stale) rather than a live tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionResult {
    pub items: Vec<TrendItem>,
    pub source: Option<SourceKind>,
    pub is_stale: bool,
    pub fetched_at: DateTime<Utc>,
}
