use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::runtime::Handle;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::location::{normalize_components, Suggestion, SuggestionSource};

const CITY_TYPES: &str = "(cities)";
const STATUS_OK: &str = "OK";

/// A raw upstream prediction: the display string plus its ordered address parts.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacePrediction {
    pub description: String,
    pub components: Vec<String>,
}

impl PlacePrediction {
    fn into_suggestion(self) -> Option<Suggestion> {
        let value = normalize_components(&self.components);
        if value.is_empty() {
            return None;
        }
        Some(Suggestion::new(self.description, value, SuggestionSource::Primary))
    }
}

#[async_trait]
pub trait PlacePredictor: Send + Sync {
    async fn predict(&self, input: &str) -> AppResult<Vec<PlacePrediction>>;
}

/// Produces the predictor on first use. Called at most once per successful load.
#[async_trait]
pub trait PredictorLoader: Send + Sync {
    async fn load(&self) -> AppResult<Arc<dyn PlacePredictor>>;
}

/// The primary suggestion source. Cheap to clone; every clone shares one
/// lazily loaded predictor.
#[derive(Clone)]
pub struct PrimarySource {
    inner: Arc<PrimaryInner>,
}

struct PrimaryInner {
    loader: Arc<dyn PredictorLoader>,
    client: OnceCell<Arc<dyn PlacePredictor>>,
    warming: AtomicBool,
}

impl PrimarySource {
    pub fn new(config: &AppConfig) -> Self {
        Self::from_loader(Arc::new(HttpPlacesLoader::new(config)))
    }

    pub fn from_loader(loader: Arc<dyn PredictorLoader>) -> Self {
        Self {
            inner: Arc::new(PrimaryInner {
                loader,
                client: OnceCell::new(),
                warming: AtomicBool::new(false),
            }),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.inner.client.initialized()
    }

    /// Loads the predictor, or waits for a load already in progress.
    pub async fn ensure_ready(&self) -> AppResult<()> {
        let loader = Arc::clone(&self.inner.loader);
        self.inner
            .client
            .get_or_try_init(|| async move { loader.load().await })
            .await?;
        Ok(())
    }

    /// Starts loading in the background without waiting for it.
    pub fn warm_up(&self) {
        let Ok(runtime) = Handle::try_current() else {
            debug!("no async runtime; places predictor will load on first ensure_ready");
            return;
        };
        if self.is_ready() || self.inner.warming.swap(true, Ordering::SeqCst) {
            return;
        }
        let source = self.clone();
        runtime.spawn(async move {
            if let Err(err) = source.ensure_ready().await {
                warn!(?err, "places predictor failed to load");
            }
            source.inner.warming.store(false, Ordering::SeqCst);
        });
    }

    /// Never fails: an unloaded predictor or an upstream error both yield an
    /// empty list.
    pub async fn predict(&self, text: &str) -> Vec<Suggestion> {
        let Some(client) = self.inner.client.get() else {
            debug!("places predictor not ready; skipping primary suggestions");
            self.warm_up();
            return Vec::new();
        };

        match client.predict(text).await {
            Ok(predictions) => predictions
                .into_iter()
                .filter_map(PlacePrediction::into_suggestion)
                .collect(),
            Err(err) => {
                warn!(?err, "places prediction failed; degrading to empty list");
                Vec::new()
            }
        }
    }
}

pub struct HttpPlacesLoader {
    endpoint: String,
    api_key: Option<SecretString>,
    timeout: Duration,
}

impl HttpPlacesLoader {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            endpoint: config.places_autocomplete_endpoint.clone(),
            api_key: config.google_places_api_key.clone(),
            timeout: config.http_timeout(),
        }
    }
}

#[async_trait]
impl PredictorLoader for HttpPlacesLoader {
    async fn load(&self) -> AppResult<Arc<dyn PlacePredictor>> {
        let api_key = self
            .api_key
            .clone()
            .ok_or_else(|| AppError::Config("GOOGLE_PLACES_API_KEY is not configured".into()))?;
        let http = reqwest::Client::builder().timeout(self.timeout).build()?;
        Ok(Arc::new(HttpPlacesPredictor {
            http,
            endpoint: self.endpoint.clone(),
            api_key,
        }))
    }
}

pub struct HttpPlacesPredictor {
    http: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
}

#[async_trait]
impl PlacePredictor for HttpPlacesPredictor {
    async fn predict(&self, input: &str) -> AppResult<Vec<PlacePrediction>> {
        #[derive(Deserialize)]
        struct Response {
            status: String,
            #[serde(default)]
            predictions: Vec<ResponsePrediction>,
            #[serde(default)]
            error_message: Option<String>,
        }

        #[derive(Deserialize)]
        struct ResponsePrediction {
            description: String,
            #[serde(default)]
            terms: Vec<ResponseTerm>,
        }

        #[derive(Deserialize)]
        struct ResponseTerm {
            value: String,
        }

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("input", input),
                ("types", CITY_TYPES),
                ("key", self.api_key.expose_secret()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let parsed: Response = response.json().await?;
        if parsed.status != STATUS_OK {
            debug!(
                status = %parsed.status,
                message = ?parsed.error_message,
                "places autocomplete returned no usable predictions"
            );
            return Ok(Vec::new());
        }

        Ok(parsed
            .predictions
            .into_iter()
            .map(|p| PlacePrediction {
                description: p.description,
                components: p.terms.into_iter().map(|t| t.value).collect(),
            })
            .collect())
    }
}
