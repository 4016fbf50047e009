use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::fallback::{CityDirectory, CityRecord};
use crate::geolocation::{ReverseGeocodeResult, ReverseGeocoder};
use crate::planning::{PlanRequest, PlanningResponse, TripDetail};

/// HTTP client for the trip planning backend.
#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ResultsEnvelope<T> {
    #[serde(alias = "Results")]
    results: Option<T>,
}

impl BackendClient {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("destination-resolver/", env!("CARGO_PKG_VERSION")))
            .timeout(config.http_timeout())
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn search_cities(&self, term: &str) -> AppResult<Vec<CityRecord>> {
        let url = self.endpoint(&["cities"])?;
        let envelope: ResultsEnvelope<Vec<CityRecord>> = self
            .http
            .get(url)
            .query(&[("term", term)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(envelope.results.unwrap_or_default())
    }

    pub async fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> AppResult<ReverseGeocodeResult> {
        let url = self.endpoint(&["reverse-geocoding"])?;
        let envelope: ResultsEnvelope<ReverseGeocodeResult> = self
            .http
            .get(url)
            .query(&[("lat", latitude), ("lng", longitude)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        envelope
            .results
            .ok_or_else(|| AppError::Config("reverse geocoding returned no result".into()))
    }

    pub async fn get_plans(&self, request: &PlanRequest) -> AppResult<PlanningResponse> {
        let url = self.endpoint(&["plans"])?;
        debug!(precise = request.precise(), "requesting travel plans");
        let response: PlanningResponse = self
            .http
            .get(url)
            .query(&request.query_pairs())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response)
    }

    pub async fn get_plan_details(&self, plan_id: &str, date: Option<&str>) -> AppResult<TripDetail> {
        let url = self.endpoint(&["plans", plan_id])?;
        let mut query = vec![("json_only", "true")];
        if let Some(date) = date {
            query.push(("date", date));
        }
        let detail: TripDetail = self
            .http
            .get(url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(detail)
    }

    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| AppError::Config(format!("invalid API base URL: {err}")))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Config("invalid API base URL".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl CityDirectory for BackendClient {
    async fn search_cities(&self, term: &str) -> AppResult<Vec<CityRecord>> {
        BackendClient::search_cities(self, term).await
    }
}

#[async_trait]
impl ReverseGeocoder for BackendClient {
    async fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> AppResult<ReverseGeocodeResult> {
        BackendClient::reverse_geocode(self, latitude, longitude).await
    }
}
