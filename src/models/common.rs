use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Store a purchase was made through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseSource {
    GooglePlay,
    AppStore,
}

/// Source name outside the supported set (names are case-sensitive)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported purchase source: {0}")]
pub struct UnknownSource(pub String);

impl FromStr for PurchaseSource {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google_play" => Ok(Self::GooglePlay),
            "app_store" => Ok(Self::AppStore),
            other => Err(UnknownSource(other.to_string())),
        }
    }
}

impl PurchaseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GooglePlay => "google_play",
            Self::AppStore => "app_store",
        }
    }
}
