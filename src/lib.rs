mod backend;
mod config;
mod debounce;
mod errors;
mod fallback;
mod geolocation;
mod location;
mod places;
mod planning;
mod resolver;
mod telemetry;
mod validation;

use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::json;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use backend::BackendClient;
pub use config::{AppConfig, PublicAppConfig};
pub use debounce::Debouncer;
pub use errors::{AppError, AppResult};
pub use fallback::{CityDirectory, CityRecord, FallbackSource};
pub use geolocation::{
    Coordinates, FixedPositionProvider, GeolocationError, GeolocationResolver, GeolocationState,
    PositionOptions, PositionProvider, ReverseGeocodeResult, ReverseGeocoder,
    UnsupportedPositionProvider, IDLE_LABEL, LOCATING_LABEL,
};
pub use location::{
    normalize_components, CityToken, PreciseLocation, ResolvedDestination, Suggestion,
    SuggestionSource,
};
pub use places::{
    HttpPlacesLoader, PlacePrediction, PlacePredictor, PredictorLoader, PrimarySource,
};
pub use planning::{
    PlaceDetail, PlanRequest, PlanningResponse, PriceLevel, TimeSectionPlace, TravelPlan,
    TripDetail,
};
pub use resolver::{DestinationResolver, FieldSnapshot, QueryTicket, ResolverOptions, ResolverSession};
pub use telemetry::{hash_query, TelemetryClient};
pub use validation::{resolve_destination, validate, SELECT_FROM_DROPDOWN};

/// Process-wide wiring: one backend client, one places predictor and one
/// geolocation resolver, shared by every resolver built from it.
pub struct DestinationServices {
    config: AppConfig,
    backend: BackendClient,
    primary: PrimarySource,
    geolocation: Arc<GeolocationResolver>,
    telemetry: TelemetryClient,
}

impl DestinationServices {
    pub fn initialize(config: AppConfig) -> AppResult<Self> {
        init_tracing();
        let backend = BackendClient::new(&config)?;
        let primary = PrimarySource::new(&config);
        primary.warm_up();

        let provider: Arc<dyn PositionProvider> = match config.device_position {
            Some((latitude, longitude)) => Arc::new(FixedPositionProvider::new(latitude, longitude)),
            None => Arc::new(UnsupportedPositionProvider),
        };
        let geolocation = Arc::new(GeolocationResolver::new(
            provider,
            Arc::new(backend.clone()),
            PositionOptions::from_config(&config),
        ));

        let telemetry = TelemetryClient::new(&config.data_dir, &config)?;
        if let Err(err) = telemetry.record(
            "resolver_start",
            json!({
                "version": env!("CARGO_PKG_VERSION"),
                "has_places_key": config.google_places_api_key.is_some(),
            }),
        ) {
            warn!(?err, "failed to queue telemetry bootstrap event");
        }

        Ok(Self {
            config,
            backend,
            primary,
            geolocation,
            telemetry,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }

    pub fn telemetry(&self) -> &TelemetryClient {
        &self.telemetry
    }

    pub fn resolver(&self) -> Arc<DestinationResolver> {
        let resolver = DestinationResolver::new(
            self.primary.clone(),
            FallbackSource::new(Arc::new(self.backend.clone())),
            Arc::clone(&self.geolocation),
            ResolverOptions::from_config(&self.config),
        )
        .with_telemetry(self.telemetry.clone());
        Arc::new(resolver)
    }

    /// Starts a debounced typing session over a fresh resolver.
    pub fn session(&self) -> ResolverSession {
        ResolverSession::start(self.resolver())
    }

    pub async fn plans_for(&self, request: &PlanRequest) -> AppResult<PlanningResponse> {
        self.backend.get_plans(request).await
    }

    pub fn shutdown(&self) {
        if let Err(err) = self.telemetry.flush() {
            warn!(?err, "failed to flush telemetry queue");
        }
    }
}

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,destination_resolver=debug"));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init();
    });
}
