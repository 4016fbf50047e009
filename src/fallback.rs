use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::AppResult;
use crate::location::{CityToken, Suggestion, SuggestionSource};

/// A city directory entry. Accepts both the `region` and the older
/// `admin_area_level_one` field name; `region` wins when both are sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CityRecordRaw")]
pub struct CityRecord {
    pub city: String,
    pub region: Option<String>,
    pub country: String,
}

#[derive(Deserialize)]
struct CityRecordRaw {
    city: String,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    admin_area_level_one: Option<String>,
    country: String,
}

impl From<CityRecordRaw> for CityRecord {
    fn from(raw: CityRecordRaw) -> Self {
        let region = raw
            .region
            .filter(|r| !r.trim().is_empty())
            .or(raw.admin_area_level_one);
        Self {
            city: raw.city,
            region,
            country: raw.country,
        }
    }
}

impl CityRecord {
    pub fn token(&self) -> CityToken {
        CityToken::new(self.city.clone(), self.region.clone(), self.country.clone())
    }
}

#[async_trait]
pub trait CityDirectory: Send + Sync {
    async fn search_cities(&self, term: &str) -> AppResult<Vec<CityRecord>>;
}

/// Backend city search, consulted only when the primary source comes back empty.
#[derive(Clone)]
pub struct FallbackSource {
    directory: Arc<dyn CityDirectory>,
}

impl FallbackSource {
    pub fn new(directory: Arc<dyn CityDirectory>) -> Self {
        Self { directory }
    }

    pub async fn search(&self, term: &str) -> Vec<Suggestion> {
        let term = term.to_lowercase();
        match self.directory.search_cities(&term).await {
            Ok(records) => records
                .iter()
                .map(|record| {
                    let value = record.token().to_string();
                    Suggestion::new(value.clone(), value, SuggestionSource::Fallback)
                })
                .collect(),
            Err(err) => {
                warn!(?err, "city search failed; no fallback suggestions");
                Vec::new()
            }
        }
    }
}
