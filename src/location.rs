use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    Primary,
    Fallback,
    Geolocation,
}

impl SuggestionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
            Self::Geolocation => "geolocation",
        }
    }
}

/// One dropdown entry. `label` is what the user sees, `value` is what the
/// field takes on when the entry is picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub label: String,
    pub value: String,
    pub source: SuggestionSource,
}

impl Suggestion {
    pub fn new(label: impl Into<String>, value: impl Into<String>, source: SuggestionSource) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            source,
        }
    }
}

/// Canonical place identity. A missing region means the two-part
/// `city, country` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityToken {
    pub city: String,
    pub region: Option<String>,
    pub country: String,
}

impl CityToken {
    pub fn new(city: impl Into<String>, region: Option<String>, country: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            region: region.filter(|r| !r.trim().is_empty()),
            country: country.into(),
        }
    }
}

impl fmt::Display for CityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.region {
            Some(region) => write!(f, "{}, {}, {}", self.city, region, self.country),
            None => write!(f, "{}, {}", self.city, self.country),
        }
    }
}

/// Collapses an ordered address breakdown into the token string the planner
/// expects: `first, second, last` for three or more parts.
pub fn normalize_components<S: AsRef<str>>(components: &[S]) -> String {
    let parts: Vec<&str> = components
        .iter()
        .map(|c| c.as_ref().trim())
        .filter(|c| !c.is_empty())
        .collect();
    match parts.as_slice() {
        [] => String::new(),
        [only] => (*only).to_string(),
        [first, second] => format!("{first}, {second}"),
        [first, second, .., last] => format!("{first}, {second}, {last}"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreciseLocation {
    pub longitude: f64,
    pub latitude: f64,
}

impl PreciseLocation {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }
}

impl fmt::Display for PreciseLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.longitude, self.latitude)
    }
}

/// The destination handed to a plan request. Only produced through
/// validation, see [`crate::validation::resolve_destination`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDestination {
    location: String,
    precise: bool,
}

impl ResolvedDestination {
    pub(crate) fn new_unchecked(location: String, precise: bool) -> Self {
        Self { location, precise }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn is_precise(&self) -> bool {
        self.precise
    }
}

impl From<PreciseLocation> for ResolvedDestination {
    fn from(value: PreciseLocation) -> Self {
        Self::new_unchecked(value.to_string(), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_component_counts() {
        assert_eq!(
            normalize_components(&["Paris", "Île-de-France", "Métropole", "France"]),
            "Paris, Île-de-France, France"
        );
        assert_eq!(
            normalize_components(&["San Francisco", "CA", "USA"]),
            "San Francisco, CA, USA"
        );
        assert_eq!(normalize_components(&["Tokyo", "Japan"]), "Tokyo, Japan");
        assert_eq!(normalize_components(&["Singapore"]), "Singapore");
        assert_eq!(normalize_components(&[" ", "Monaco"]), "Monaco");
    }

    #[test]
    fn city_token_drops_blank_region() {
        let token = CityToken::new("Lisbon", Some("  ".into()), "Portugal");
        assert_eq!(token.to_string(), "Lisbon, Portugal");

        let token = CityToken::new("Austin", Some("TX".into()), "USA");
        assert_eq!(token.to_string(), "Austin, TX, USA");
    }

    #[test]
    fn precise_location_is_longitude_first() {
        let location = PreciseLocation::new(-122.084, 37.421998);
        assert_eq!(location.to_string(), "-122.084, 37.421998");

        let destination = ResolvedDestination::from(location);
        assert!(destination.is_precise());
        assert_eq!(destination.location(), "-122.084, 37.421998");
    }
}
