// HTTP tests for the search routes

use std::collections::HashSet;
use std::sync::Arc;

use actix_web::{http::StatusCode, test, web, App};
use async_trait::async_trait;
use serde_json::Value;

use stay_search::config::SearchSettings;
use stay_search::routes::{self, search::AppState};
use stay_search::services::InMemoryStore;
use stay_search::{
    Distance, Listing, ListingId, ReservedNight, SearchError, SearchOrchestrator, SpatialIndex,
};

fn create_listing(id: ListingId, guest_number: u32) -> Listing {
    Listing {
        id,
        host: "alice".to_string(),
        address: format!("{} Mission St", id),
        guest_number,
        images: vec![format!("https://images/{}.jpg", id)],
    }
}

async fn seeded_state() -> AppState {
    let store = Arc::new(InMemoryStore::new());
    store.publish_listing(create_listing(1, 4), 37.77, -122.41).await;
    store.publish_listing(create_listing(2, 4), 37.77, -122.41).await;
    store
        .reserve_nights([ReservedNight {
            listing_id: 2,
            date: "2024-06-02".parse().unwrap(),
        }])
        .await;

    AppState {
        orchestrator: SearchOrchestrator::from_store(store),
        search: SearchSettings::default(),
        postgres: None,
    }
}

struct FailingIndex;

#[async_trait]
impl SpatialIndex for FailingIndex {
    async fn find_within_radius(
        &self,
        _latitude: f64,
        _longitude: f64,
        _radius: Distance,
    ) -> Result<HashSet<ListingId>, SearchError> {
        Err(SearchError::StorageUnavailable("pool timed out".to_string()))
    }
}

const BASE_QUERY: &str = "/api/v1/search?guest_number=2&checkin_date=2024-06-01&checkout_date=2024-06-03&lat=37.77&lon=-122.41";

#[actix_web::test]
async fn test_search_returns_available_listings() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(seeded_state().await))
            .configure(routes::configure_routes),
    )
    .await;

    let req = test::TestRequest::get()
        .uri(&format!("{}&distance=1km", BASE_QUERY))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Vec<Listing> = test::read_body_json(resp).await;
    assert_eq!(body, vec![create_listing(1, 4)]);
}

#[actix_web::test]
async fn test_search_uses_default_distance() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(seeded_state().await))
            .configure(routes::configure_routes),
    )
    .await;

    let req = test::TestRequest::get().uri(BASE_QUERY).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["guestNumber"], 4);
}

#[actix_web::test]
async fn test_search_rejects_bad_input() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(seeded_state().await))
            .configure(routes::configure_routes),
    )
    .await;

    let cases = vec![
        (
            "/api/v1/search?guest_number=2&checkin_date=2024-06-03&checkout_date=2024-06-01&lat=37.77&lon=-122.41".to_string(),
            Some("invalid_date_range"),
        ),
        (format!("{}&distance=10", BASE_QUERY), Some("malformed_distance")),
        (format!("{}&distance=9000km", BASE_QUERY), Some("malformed_distance")),
        (
            "/api/v1/search?guest_number=0&checkin_date=2024-06-01&checkout_date=2024-06-03&lat=37.77&lon=-122.41".to_string(),
            Some("validation_failed"),
        ),
        (
            "/api/v1/search?guest_number=2&checkin_date=2024-06-01&checkout_date=2024-06-03&lat=95&lon=-122.41".to_string(),
            Some("invalid_coordinates"),
        ),
        ("/api/v1/search?guest_number=2&lat=37.77&lon=-122.41".to_string(), None),
    ];

    for (uri, kind) in cases {
        let req = test::TestRequest::get().uri(&uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "uri: {}", uri);

        if let Some(kind) = kind {
            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["error"], kind, "uri: {}", uri);
            assert_eq!(body["status_code"], 400);
        }
    }
}

#[actix_web::test]
async fn test_storage_failure_maps_to_service_unavailable() {
    let store = Arc::new(InMemoryStore::new());
    let state = AppState {
        orchestrator: SearchOrchestrator::new(Arc::new(FailingIndex), store.clone(), store),
        search: SearchSettings::default(),
        postgres: None,
    };
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(routes::configure_routes),
    )
    .await;

    let req = test::TestRequest::get().uri(BASE_QUERY).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "storage_unavailable");
}

#[actix_web::test]
async fn test_health_check() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(seeded_state().await))
            .configure(routes::configure_routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "memory");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
