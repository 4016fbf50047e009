use std::path::PathBuf;
use std::time::Duration;
use std::{env, io};

use secrecy::SecretString;
use serde::Serialize;
use tracing::debug;

const DEFAULT_API_BASE_URL: &str = "http://localhost:10000/v1";
const DEFAULT_PLACES_AUTOCOMPLETE_ENDPOINT: &str =
    "https://maps.googleapis.com/maps/api/place/autocomplete/json";
const DEFAULT_TELEMETRY_BUFFER_MAX_BYTES: u64 = 5 * 1024 * 1024;
const DEFAULT_TELEMETRY_BUFFER_MAX_FILES: usize = 5;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_base_url: String,
    pub places_autocomplete_endpoint: String,
    pub google_places_api_key: Option<SecretString>,
    pub debounce_ms: u64,
    pub min_query_chars: usize,
    pub geolocation_timeout_ms: u64,
    pub geolocation_high_accuracy: bool,
    pub http_timeout_secs: u64,
    pub device_position: Option<(f64, f64)>,
    pub data_dir: PathBuf,
    pub telemetry_enabled_by_default: bool,
    pub telemetry_batch_size: usize,
    pub telemetry_buffer_max_bytes: u64,
    pub telemetry_buffer_max_files: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicAppConfig {
    pub api_base_url: String,
    pub places_autocomplete_endpoint: String,
    pub debounce_ms: u64,
    pub min_query_chars: usize,
    pub geolocation_timeout_ms: u64,
    pub geolocation_high_accuracy: bool,
    pub http_timeout_secs: u64,
    pub has_device_position: bool,
    pub data_dir: String,
    pub telemetry_enabled_by_default: bool,
    pub telemetry_batch_size: usize,
    pub has_google_places_key: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        Self {
            api_base_url: env::var("API_BASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            places_autocomplete_endpoint: env::var("PLACES_AUTOCOMPLETE_ENDPOINT")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PLACES_AUTOCOMPLETE_ENDPOINT.to_string()),
            google_places_api_key: env::var("GOOGLE_PLACES_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from),
            debounce_ms: parse_u64("SUGGESTION_DEBOUNCE_MS", 300),
            min_query_chars: parse_usize("SUGGESTION_MIN_CHARS", 2).max(1),
            geolocation_timeout_ms: parse_u64("GEOLOCATION_TIMEOUT_MS", 10_000),
            geolocation_high_accuracy: parse_bool("GEOLOCATION_HIGH_ACCURACY", true),
            http_timeout_secs: parse_u64("HTTP_TIMEOUT_SECS", 10).max(1),
            device_position: parse_f64("DEVICE_LATITUDE").zip(parse_f64("DEVICE_LONGITUDE")),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir().join("destination-resolver")),
            telemetry_enabled_by_default: parse_bool("TELEMETRY_ENABLED", true),
            telemetry_batch_size: parse_usize("TELEMETRY_BATCH_SIZE", 25).max(1),
            telemetry_buffer_max_bytes: parse_u64(
                "TELEMETRY_BUFFER_MAX_BYTES",
                DEFAULT_TELEMETRY_BUFFER_MAX_BYTES,
            ),
            telemetry_buffer_max_files: parse_usize(
                "TELEMETRY_BUFFER_MAX_FILES",
                DEFAULT_TELEMETRY_BUFFER_MAX_FILES,
            )
            .max(1),
        }
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn geolocation_timeout(&self) -> Duration {
        Duration::from_millis(self.geolocation_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn public_profile(&self) -> PublicAppConfig {
        PublicAppConfig {
            api_base_url: self.api_base_url.clone(),
            places_autocomplete_endpoint: self.places_autocomplete_endpoint.clone(),
            debounce_ms: self.debounce_ms,
            min_query_chars: self.min_query_chars,
            geolocation_timeout_ms: self.geolocation_timeout_ms,
            geolocation_high_accuracy: self.geolocation_high_accuracy,
            http_timeout_secs: self.http_timeout_secs,
            has_device_position: self.device_position.is_some(),
            data_dir: self.data_dir.to_string_lossy().to_string(),
            telemetry_enabled_by_default: self.telemetry_enabled_by_default,
            telemetry_batch_size: self.telemetry_batch_size,
            has_google_places_key: self.google_places_api_key.is_some(),
        }
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn parse_f64(key: &str) -> Option<f64> {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_public_profile_without_secrets() {
        env::set_var("GOOGLE_PLACES_API_KEY", "secret");
        env::set_var("API_BASE_URL", "http://planner.test/v1");
        env::set_var("SUGGESTION_DEBOUNCE_MS", "120");
        env::set_var("TELEMETRY_ENABLED", "false");
        env::set_var("DEVICE_LATITUDE", "37.42");
        env::set_var("DEVICE_LONGITUDE", "not-a-number");

        let config = AppConfig::from_env();
        let public = config.public_profile();

        assert_eq!(public.api_base_url, "http://planner.test/v1");
        assert_eq!(config.debounce_window(), Duration::from_millis(120));
        assert!(!public.telemetry_enabled_by_default);
        assert!(public.has_google_places_key);
        assert!(config.google_places_api_key.is_some());
        assert!(!public.has_device_position);
        assert_eq!(public.min_query_chars, 2);
        assert_eq!(
            config.telemetry_buffer_max_bytes,
            DEFAULT_TELEMETRY_BUFFER_MAX_BYTES
        );
        let serialized = serde_json::to_string(&public).unwrap();
        assert!(!serialized.contains("secret"));
    }
}
