use std::sync::Arc;

use chrono::NaiveDate;
use httptest::matchers::{all_of, contains, request, url_decoded};
use httptest::responders::{json_encoded, status_code};
use httptest::{Expectation, Server};
use secrecy::SecretString;
use serde_json::json;

use destination_resolver::{
    resolve_destination, AppConfig, BackendClient, DestinationResolver, FallbackSource,
    GeolocationResolver, PlanRequest, PositionOptions, PriceLevel, PrimarySource,
    ResolverOptions, SuggestionSource, UnsupportedPositionProvider,
};

fn config_for(server: &Server) -> AppConfig {
    let mut config = AppConfig::from_env();
    config.api_base_url = server.url("/v1").to_string();
    config.places_autocomplete_endpoint = server.url("/places/autocomplete").to_string();
    config.google_places_api_key = Some(SecretString::from("test-key".to_string()));
    config
}

fn resolver_for(config: &AppConfig, primary: PrimarySource) -> DestinationResolver {
    let backend = BackendClient::new(config).expect("backend client");
    let geolocation = Arc::new(GeolocationResolver::new(
        Arc::new(UnsupportedPositionProvider),
        Arc::new(backend.clone()),
        PositionOptions::default(),
    ));
    DestinationResolver::new(
        primary,
        FallbackSource::new(Arc::new(backend)),
        geolocation,
        ResolverOptions::default(),
    )
}

#[tokio::test]
async fn city_search_accepts_both_region_spellings() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/v1/cities"),
            request::query(url_decoded(contains(("term", "aus")))),
        ])
        .respond_with(json_encoded(json!({
            "results": [
                { "city": "Austin", "admin_area_level_one": "TX", "country": "USA" },
                { "city": "Austin", "region": "MN", "country": "USA" },
                { "city": "Aussillon", "country": "France" }
            ]
        }))),
    );

    let config = config_for(&server);
    let backend = BackendClient::new(&config).expect("backend client");
    let fallback = FallbackSource::new(Arc::new(backend));

    let values: Vec<String> = fallback
        .search("AUS")
        .await
        .into_iter()
        .map(|s| s.value)
        .collect();
    assert_eq!(
        values,
        vec!["Austin, TX, USA", "Austin, MN, USA", "Aussillon, France"]
    );
}

#[tokio::test]
async fn places_predictions_shadow_city_search() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/places/autocomplete"),
            request::query(url_decoded(contains(("input", "san fr")))),
            request::query(url_decoded(contains(("types", "(cities)")))),
            request::query(url_decoded(contains(("key", "test-key")))),
        ])
        .respond_with(json_encoded(json!({
            "status": "OK",
            "predictions": [{
                "description": "San Francisco, CA, USA",
                "terms": [
                    { "offset": 0, "value": "San Francisco" },
                    { "offset": 15, "value": "CA" },
                    { "offset": 19, "value": "USA" }
                ]
            }]
        }))),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/v1/cities"))
            .times(0)
            .respond_with(status_code(200)),
    );

    let config = config_for(&server);
    let primary = PrimarySource::new(&config);
    primary.ensure_ready().await.expect("places predictor loads");
    let resolver = resolver_for(&config, primary);

    resolver.set_text("san fr");
    assert!(resolver.handle_debounced("san fr").await);

    let snapshot = resolver.snapshot();
    assert!(snapshot.open);
    assert_eq!(snapshot.suggestions.len(), 1);
    assert_eq!(snapshot.suggestions[0].label, "San Francisco, CA, USA");
    assert_eq!(snapshot.suggestions[0].value, "San Francisco, CA, USA");
    assert_eq!(snapshot.suggestions[0].source, SuggestionSource::Primary);
}

#[tokio::test]
async fn zero_results_status_degrades_to_city_search() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/places/autocomplete"))
            .respond_with(json_encoded(json!({ "status": "ZERO_RESULTS", "predictions": [] }))),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/v1/cities"),
            request::query(url_decoded(contains(("term", "qwerty")))),
        ])
        .respond_with(json_encoded(json!({ "results": [] }))),
    );

    let config = config_for(&server);
    let primary = PrimarySource::new(&config);
    primary.ensure_ready().await.expect("places predictor loads");
    let resolver = resolver_for(&config, primary);

    resolver.handle_debounced("Qwerty").await;
    let snapshot = resolver.snapshot();
    assert!(snapshot.suggestions.is_empty());
    assert!(!snapshot.open);
}

#[tokio::test]
async fn server_errors_never_reach_the_caller() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/places/autocomplete"))
            .respond_with(status_code(500)),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/v1/cities"))
            .respond_with(status_code(502)),
    );

    let config = config_for(&server);
    let primary = PrimarySource::new(&config);
    primary.ensure_ready().await.expect("places predictor loads");
    let resolver = resolver_for(&config, primary);

    resolver.handle_debounced("lond").await;
    assert!(resolver.snapshot().suggestions.is_empty());
}

#[tokio::test]
async fn missing_places_key_leaves_primary_unloaded() {
    let server = Server::run();
    let mut config = config_for(&server);
    config.google_places_api_key = None;

    let primary = PrimarySource::new(&config);
    assert!(primary.ensure_ready().await.is_err());
    assert!(!primary.is_ready());
    assert!(primary.predict("paris").await.is_empty());
}

#[tokio::test]
async fn reverse_geocode_failure_reports_raw_coordinates() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/v1/reverse-geocoding"),
            request::query(url_decoded(contains(("lat", "37.421998")))),
            request::query(url_decoded(contains(("lng", "-122.084")))),
        ])
        .respond_with(status_code(500)),
    );

    let config = config_for(&server);
    let backend = Arc::new(BackendClient::new(&config).expect("backend client"));
    let geolocation = GeolocationResolver::new(
        Arc::new(destination_resolver::FixedPositionProvider::new(37.421998, -122.084)),
        backend,
        PositionOptions::default(),
    );
    geolocation.locate().await;

    let state = geolocation.state();
    assert_eq!(state.address.as_deref(), Some("-122.084, 37.421998"));
    assert!(state.destination().expect("position").is_precise());
}

#[tokio::test]
async fn reverse_geocode_success_formats_city_token() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/v1/reverse-geocoding")).respond_with(
            json_encoded(json!({
                "results": { "city": "Lisbon", "admin_area_level_one": "", "country": "Portugal" }
            })),
        ),
    );

    let config = config_for(&server);
    let backend = Arc::new(BackendClient::new(&config).expect("backend client"));
    let geolocation = GeolocationResolver::new(
        Arc::new(destination_resolver::FixedPositionProvider::new(38.7223, -9.1393)),
        backend,
        PositionOptions::default(),
    );
    geolocation.locate().await;

    assert_eq!(geolocation.state().address.as_deref(), Some("Lisbon, Portugal"));
}

#[tokio::test]
async fn plan_request_carries_precise_flag() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/v1/plans"),
            request::query(url_decoded(contains(("location", "-122.084, 37.421998")))),
            request::query(url_decoded(contains(("date", "2026-11-02")))),
            request::query(url_decoded(contains(("price", "2")))),
            request::query(url_decoded(contains(("precise", "true")))),
            request::query(url_decoded(contains(("nearby", "false")))),
            request::query(url_decoded(contains(("json_only", "true")))),
        ])
        .respond_with(json_encoded(json!({
            "travel_destination": "Mountain View, CA, USA",
            "travel_plans": [{
                "id": "plan-1",
                "places": [{
                    "id": "p1",
                    "place_name": "Shoreline Park",
                    "category": "visit",
                    "start_time": 9,
                    "end_time": 11,
                    "address": "3070 N Shoreline Blvd",
                    "url": "https://example.com/p1",
                    "place_icon_css_class": "park"
                }],
                "saved": false,
                "planning_spec": "default"
            }],
            "trip_details_url": ["/plans/plan-1"],
            "error": null,
            "status_code": 200
        }))),
    );

    let config = config_for(&server);
    let backend = BackendClient::new(&config).expect("backend client");
    let destination = resolve_destination("-122.084, 37.421998", true).expect("precise is exempt");
    let request = PlanRequest::new(
        destination,
        NaiveDate::from_ymd_opt(2026, 11, 2).expect("valid date"),
        PriceLevel::Moderate,
        false,
    );

    let response = backend.get_plans(&request).await.expect("plans");
    assert_eq!(response.travel_destination, "Mountain View, CA, USA");
    assert_eq!(response.travel_plans[0].places[0].place_name, "Shoreline Park");
}

#[tokio::test]
async fn plan_details_tolerate_pascal_case() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method_path("GET", "/v1/plans/plan-9"),
            request::query(url_decoded(contains(("date", "2026-11-02")))),
        ])
        .respond_with(json_encoded(json!({
            "OriginalPlanID": "plan-9",
            "LatLongs": [[38.72, -9.14]],
            "PlaceCategories": ["eatery"],
            "PlaceDetails": [{ "ID": "x", "Name": "Time Out Market" }],
            "ShownActive": [true],
            "TravelDestination": "Lisbon, Portugal",
            "TravelDate": "2026-11-02",
            "Score": 1.0,
            "ScoreOld": 0.0
        }))),
    );

    let config = config_for(&server);
    let backend = BackendClient::new(&config).expect("backend client");
    let detail = backend
        .get_plan_details("plan-9", Some("2026-11-02"))
        .await
        .expect("details");

    assert_eq!(detail.original_plan_id, "plan-9");
    assert_eq!(detail.place_details[0].name, "Time Out Market");
    assert_eq!(detail.travel_destination, "Lisbon, Portugal");
}
