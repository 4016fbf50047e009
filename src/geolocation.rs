use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::errors::AppResult;
use crate::location::{CityToken, PreciseLocation, ResolvedDestination, Suggestion, SuggestionSource};

pub const IDLE_LABEL: &str = "Use My Location";
pub const LOCATING_LABEL: &str = "Locating...";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeolocationError {
    #[error("Geolocation is not supported on this device")]
    Unsupported,
    #[error("Location permission was denied")]
    PermissionDenied,
    #[error("Location is unavailable: {0}")]
    Unavailable(String),
    #[error("Timed out while acquiring location")]
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub timeout: Duration,
    pub high_accuracy: bool,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            high_accuracy: true,
        }
    }
}

impl PositionOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            timeout: config.geolocation_timeout(),
            high_accuracy: config.geolocation_high_accuracy,
        }
    }
}

#[async_trait]
pub trait PositionProvider: Send + Sync {
    async fn current_position(
        &self,
        options: PositionOptions,
    ) -> Result<Coordinates, GeolocationError>;
}

/// Best-effort breakdown of a coordinate pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ReverseGeocodeRaw")]
pub struct ReverseGeocodeResult {
    pub city: Option<String>,
    pub admin_area_level_one: Option<String>,
    pub country: Option<String>,
}

/// Older responses name the region `region`; some send both keys.
#[derive(Deserialize)]
struct ReverseGeocodeRaw {
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    admin_area_level_one: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

impl From<ReverseGeocodeRaw> for ReverseGeocodeResult {
    fn from(raw: ReverseGeocodeRaw) -> Self {
        let admin_area_level_one = raw
            .admin_area_level_one
            .filter(|r| !r.trim().is_empty())
            .or(raw.region);
        Self {
            city: raw.city,
            admin_area_level_one,
            country: raw.country,
        }
    }
}

impl ReverseGeocodeResult {
    fn address(&self) -> Option<String> {
        let city = self.city.as_deref().map(str::trim).filter(|c| !c.is_empty())?;
        match self.country.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(country) => Some(
                CityToken::new(city, self.admin_area_level_one.clone(), country).to_string(),
            ),
            None => Some(city.to_string()),
        }
    }
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse_geocode(&self, latitude: f64, longitude: f64)
        -> AppResult<ReverseGeocodeResult>;
}

/// Reports a position fixed in configuration.
pub struct FixedPositionProvider {
    coordinates: Coordinates,
}

impl FixedPositionProvider {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            coordinates: Coordinates {
                latitude,
                longitude,
            },
        }
    }
}

#[async_trait]
impl PositionProvider for FixedPositionProvider {
    async fn current_position(
        &self,
        _options: PositionOptions,
    ) -> Result<Coordinates, GeolocationError> {
        Ok(self.coordinates)
    }
}

#[derive(Default)]
pub struct UnsupportedPositionProvider;

#[async_trait]
impl PositionProvider for UnsupportedPositionProvider {
    async fn current_position(
        &self,
        _options: PositionOptions,
    ) -> Result<Coordinates, GeolocationError> {
        Err(GeolocationError::Unsupported)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeolocationState {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
}

impl GeolocationState {
    pub fn precise_location(&self) -> Option<PreciseLocation> {
        Some(PreciseLocation::new(self.longitude?, self.latitude?))
    }

    pub fn destination(&self) -> Option<ResolvedDestination> {
        self.precise_location().map(ResolvedDestination::from)
    }

    /// The located position as a dropdown entry.
    pub fn suggestion(&self) -> Option<Suggestion> {
        let location = self.precise_location()?;
        let value = location.to_string();
        let label = self.address.clone().unwrap_or_else(|| value.clone());
        Some(Suggestion::new(label, value, SuggestionSource::Geolocation))
    }
}

pub struct GeolocationResolver {
    provider: Arc<dyn PositionProvider>,
    geocoder: Arc<dyn ReverseGeocoder>,
    options: PositionOptions,
    state: Mutex<GeolocationState>,
    in_flight: AtomicBool,
}

impl GeolocationResolver {
    pub fn new(
        provider: Arc<dyn PositionProvider>,
        geocoder: Arc<dyn ReverseGeocoder>,
        options: PositionOptions,
    ) -> Self {
        Self {
            provider,
            geocoder,
            options,
            state: Mutex::new(GeolocationState::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> GeolocationState {
        self.state.lock().clone()
    }

    pub fn is_locating(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn action_label(&self) -> &'static str {
        if self.is_locating() {
            LOCATING_LABEL
        } else {
            IDLE_LABEL
        }
    }

    /// Acquires the device position and a readable address for it. Failures
    /// land in [`GeolocationState::error`]; a call made while another is still
    /// pending returns immediately and changes nothing.
    pub async fn locate(&self) {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("geolocation already in flight; ignoring request");
            return;
        }
        let _guard = InFlightGuard(self);

        {
            let mut state = self.state.lock();
            state.loading = true;
            state.error = None;
        }

        let position = match timeout(
            self.options.timeout,
            self.provider.current_position(self.options),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(GeolocationError::Timeout),
        };

        match position {
            Ok(coords) => {
                let address = self.describe(coords).await;
                *self.state.lock() = GeolocationState {
                    latitude: Some(coords.latitude),
                    longitude: Some(coords.longitude),
                    address: Some(address),
                    loading: false,
                    error: None,
                };
            }
            Err(err) => {
                warn!(?err, "geolocation failed");
                let mut state = self.state.lock();
                state.loading = false;
                state.error = Some(err.to_string());
            }
        }
    }

    async fn describe(&self, coords: Coordinates) -> String {
        let raw = PreciseLocation::new(coords.longitude, coords.latitude).to_string();
        match self
            .geocoder
            .reverse_geocode(coords.latitude, coords.longitude)
            .await
        {
            Ok(result) => result.address().unwrap_or(raw),
            Err(err) => {
                debug!(?err, "reverse geocoding failed; using raw coordinates");
                raw
            }
        }
    }
}

/// Releases the in-flight flag even when `locate` is dropped mid-await.
struct InFlightGuard<'a>(&'a GeolocationResolver);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.state.lock().loading = false;
        self.0.in_flight.store(false, Ordering::SeqCst);
    }
}
