use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::location::ResolvedDestination;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceLevel {
    Free,
    Inexpensive,
    #[default]
    Moderate,
    Expensive,
    VeryExpensive,
    SurpriseMe,
}

impl PriceLevel {
    pub fn as_param(&self) -> &'static str {
        match self {
            Self::Free => "0",
            Self::Inexpensive => "1",
            Self::Moderate => "2",
            Self::Expensive => "3",
            Self::VeryExpensive => "4",
            Self::SurpriseMe => "0,1,2,3,4",
        }
    }

    pub fn from_param(value: &str) -> Option<Self> {
        match value.trim() {
            "0" => Some(Self::Free),
            "1" => Some(Self::Inexpensive),
            "2" => Some(Self::Moderate),
            "3" => Some(Self::Expensive),
            "4" => Some(Self::VeryExpensive),
            "0,1,2,3,4" => Some(Self::SurpriseMe),
            _ => None,
        }
    }
}

/// A search for itineraries. Owns the destination it was built from, so a
/// resolved destination feeds exactly one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRequest {
    destination: ResolvedDestination,
    pub date: NaiveDate,
    pub price: PriceLevel,
    pub nearby: bool,
}

impl PlanRequest {
    pub fn new(
        destination: ResolvedDestination,
        date: NaiveDate,
        price: PriceLevel,
        nearby: bool,
    ) -> Self {
        Self {
            destination,
            date,
            price,
            nearby,
        }
    }

    pub fn location(&self) -> &str {
        self.destination.location()
    }

    pub fn precise(&self) -> bool {
        self.destination.is_precise()
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("location", self.location().to_string()),
            ("date", self.date.format("%Y-%m-%d").to_string()),
            ("price", self.price.as_param().to_string()),
            ("nearby", self.nearby.to_string()),
            ("precise", self.precise().to_string()),
            ("json_only", "true".to_string()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSectionPlace {
    pub id: String,
    pub place_name: String,
    #[serde(default)]
    pub category: String,
    pub start_time: u32,
    pub end_time: u32,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub place_icon_css_class: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelPlan {
    pub id: String,
    #[serde(default)]
    pub places: Vec<TimeSectionPlace>,
    #[serde(default)]
    pub saved: bool,
    #[serde(default)]
    pub planning_spec: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningResponse {
    #[serde(default)]
    pub travel_destination: String,
    #[serde(default)]
    pub travel_plans: Vec<TravelPlan>,
    #[serde(default)]
    pub trip_details_url: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub status_code: u16,
}

// Some trip detail handlers serialize without field tags, so PascalCase names
// are accepted alongside the snake_case ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceDetail {
    #[serde(alias = "ID")]
    pub id: String,
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default, alias = "URL")]
    pub url: String,
    #[serde(default, alias = "FormattedAddress")]
    pub formatted_address: String,
    #[serde(default, alias = "PhotoURL")]
    pub photo_url: String,
    #[serde(default, alias = "Summary")]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripDetail {
    #[serde(alias = "OriginalPlanID")]
    pub original_plan_id: String,
    #[serde(default, alias = "LatLongs")]
    pub lat_longs: Vec<[f64; 2]>,
    #[serde(default, alias = "PlaceCategories")]
    pub place_categories: Vec<String>,
    #[serde(default, alias = "PlaceDetails")]
    pub place_details: Vec<PlaceDetail>,
    #[serde(default, alias = "ShownActive")]
    pub shown_active: Vec<bool>,
    #[serde(default, alias = "TravelDestination")]
    pub travel_destination: String,
    #[serde(default, alias = "TravelDate")]
    pub travel_date: String,
    #[serde(default, alias = "Score")]
    pub score: f64,
    #[serde(default, alias = "ScoreOld")]
    pub score_old: f64,
}
