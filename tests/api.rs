//! HTTP tests for the JSON API, driven through the router with `oneshot`.

use std::{net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use trip_planner::{
    config::AppConfig,
    db::{init_pool, run_migrations},
    error::AppError,
    routes::create_router,
    services::geocoding::{CityCandidate, CityDiscovery},
    state::AppState,
};
use url::Url;

struct FixedDiscovery;

#[async_trait]
impl CityDiscovery for FixedDiscovery {
    async fn search(&self, query: &str) -> Result<Vec<CityCandidate>, AppError> {
        Ok(vec![CityCandidate {
            name: query.to_string(),
            country: "Portugal".into(),
            region: Some("Lisboa".into()),
            latitude: Some(38.72),
            longitude: Some(-9.14),
        }])
    }
}

async fn setup_state() -> (AppState, TempDir) {
    let root = TempDir::new().expect("temp dir");
    let database_url = format!("sqlite://{}", root.path().join("api.sqlite").display());
    let config = AppConfig {
        database_url,
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        static_root: root.path().to_path_buf(),
        cookie_secret: "api-test-cookie-secret".into(),
        session_ttl_hours: 1,
        geocoding_base_url: Url::parse("http://127.0.0.1:9/").unwrap(),
        public_base_url: "http://localhost:3000".into(),
        seed_catalog: false,
    };
    let db = init_pool(&config.database_url).await.expect("pool");
    run_migrations(&db).await.expect("migrations");
    (AppState::new(config, db, Arc::new(FixedDiscovery)), root)
}

async fn setup_test_app() -> (Router, TempDir) {
    let (state, root) = setup_state().await;
    (create_router(state), root)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}

async fn signup(app: &Router, email: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/signup",
        None,
        Some(json!({ "email": email, "name": "Tester", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["token"].as_str().expect("token").to_string()
}

#[tokio::test]
async fn trips_require_a_session() {
    let (app, _root) = setup_test_app().await;

    let (status, body) = send(&app, Method::GET, "/api/trips", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthorized");

    let (status, _) = send(&app, Method::GET, "/api/trips", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_and_logout_round_trip() {
    let (app, _root) = setup_test_app().await;
    signup(&app, "ana@example.com").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/login",
        None,
        Some(json!({ "email": "Ana@Example.com", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "ana@example.com");
    let token = body["token"].as_str().unwrap().to_string();

    let (status, _) = send(&app, Method::GET, "/api/trips", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::POST, "/api/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, "/api/trips", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/login",
        None,
        Some(json!({ "email": "ana@example.com", "password": "nope-nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthorized");
}

#[tokio::test]
async fn a_trip_is_priced_through_the_api() {
    let (app, _root) = setup_test_app().await;
    let token = signup(&app, "ana@example.com").await;

    let (status, city) = send(
        &app,
        Method::POST,
        "/api/cities/ensure",
        None,
        Some(json!({ "name": "Lisbon", "country": "Portugal", "description": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(city["description"], "Discovered destination");
    let nightly = city["nightlyCost"].as_f64().unwrap();
    assert!((100.0..300.0).contains(&nightly));

    let (_, again) = send(
        &app,
        Method::POST,
        "/api/cities/ensure",
        None,
        Some(json!({ "name": "Lisbon", "country": "Portugal" })),
    )
    .await;
    assert_eq!(again["id"], city["id"]);

    let (status, trip) = send(
        &app,
        Method::POST,
        "/api/trips",
        Some(&token),
        Some(json!({ "name": "Iberia", "startDate": "2024-05-01", "endDate": "2024-05-10" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let trip_id = trip["id"].as_i64().unwrap();

    let (status, stop) = send(
        &app,
        Method::POST,
        &format!("/api/trips/{trip_id}/stops"),
        Some(&token),
        Some(json!({
            "cityId": city["id"].to_string(),
            "startDate": "2024-05-01",
            "endDate": "2024-05-03T00:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(stop["orderIndex"], 0);
    let stop_id = stop["id"].as_i64().unwrap();

    let (status, scheduled) = send(
        &app,
        Method::POST,
        &format!("/api/stops/{stop_id}/custom-activity"),
        Some(&token),
        Some(json!({ "name": "Tram 28", "cost": "3.5" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(scheduled["activity"]["category"], "Personal");

    let (status, detail) = send(
        &app,
        Method::GET,
        &format!("/api/trips/{trip_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["stops"][0]["days"], 2);
    assert_eq!(detail["stops"][0]["cost"]["activitiesCost"], 3.5);
    assert_eq!(detail["totalCost"].as_f64().unwrap(), nightly * 2.0 + 3.5);

    let (status, trips) = send(&app, Method::GET, "/api/trips", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trips.as_array().unwrap().len(), 1);
    assert_eq!(trips[0]["totalCost"], detail["totalCost"]);
}

#[tokio::test]
async fn itinerary_errors_map_to_statuses() {
    let (app, _root) = setup_test_app().await;
    let token = signup(&app, "ana@example.com").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/trips",
        Some(&token),
        Some(json!({ "name": "Backwards", "startDate": "2024-05-10", "endDate": "2024-05-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_range");

    let (status, body) = send(
        &app,
        Method::DELETE,
        "/api/stops/4242",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let (status, body) = send(
        &app,
        Method::DELETE,
        "/api/stop-activities/4242",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn malformed_bodies_render_as_validation_errors() {
    let (app, _root) = setup_test_app().await;
    let token = signup(&app, "ana@example.com").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/trips",
        Some(&token),
        Some(json!({ "name": "Someday", "startDate": "next tuesday", "endDate": "2024-05-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
    assert!(body["error"].as_str().unwrap().contains("startDate"));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/trips",
        Some(&token),
        Some(json!({ "startDate": "2024-05-01", "endDate": "2024-05-02" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/signup",
        None,
        Some(json!({ "email": "not-an-email", "name": "Bo", "password": "abc" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "bad_request");
    assert!(body["error"].as_str().unwrap().contains("password"));
}

#[tokio::test]
async fn custom_activity_is_rolled_back_when_linking_fails() {
    let (state, _root) = setup_state().await;
    let db = state.db.clone();
    let app = create_router(state);
    let token = signup(&app, "ana@example.com").await;

    let (_, city) = send(
        &app,
        Method::POST,
        "/api/cities/ensure",
        None,
        Some(json!({ "name": "Porto", "country": "Portugal" })),
    )
    .await;
    let (_, trip) = send(
        &app,
        Method::POST,
        "/api/trips",
        Some(&token),
        Some(json!({ "name": "North", "startDate": "2024-06-01", "endDate": "2024-06-05" })),
    )
    .await;
    let (_, stop) = send(
        &app,
        Method::POST,
        &format!("/api/trips/{}/stops", trip["id"]),
        Some(&token),
        Some(json!({ "cityId": city["id"], "startDate": "2024-06-01", "endDate": "2024-06-03" })),
    )
    .await;

    let count = |table: &'static str| {
        let db = db.clone();
        async move {
            sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(&db)
                .await
                .unwrap()
        }
    };
    let before = count("activities").await;
    sqlx::query(
        "CREATE TRIGGER refuse_links BEFORE INSERT ON stop_activities
         BEGIN SELECT RAISE(ABORT, 'links refused'); END",
    )
    .execute(&db)
    .await
    .unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/stops/{}/custom-activity", stop["id"]),
        Some(&token),
        Some(json!({ "name": "Port Tasting", "cost": 30 })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "internal");
    assert_eq!(count("activities").await, before);
    assert_eq!(count("stop_activities").await, 0);
}

#[tokio::test]
async fn seeding_fills_an_empty_catalog_once() {
    let (state, _root) = setup_state().await;
    assert_eq!(state.catalog.seed_defaults().await.unwrap(), 5);
    assert_eq!(state.catalog.seed_defaults().await.unwrap(), 0);

    let app = create_router(state);
    let (status, cities) = send(&app, Method::GET, "/api/cities", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let cities = cities.as_array().unwrap();
    assert_eq!(cities.len(), 5);
    assert_eq!(cities[0]["name"], "London");
    assert!(cities
        .iter()
        .all(|city| city["activities"].as_array().unwrap().len() == 3));
    let paris = cities.iter().find(|city| city["name"] == "Paris").unwrap();
    assert_eq!(paris["nightlyCost"], 200.0);
}

#[tokio::test]
async fn city_search_goes_through_discovery() {
    let (app, _root) = setup_test_app().await;

    let (status, body) = send(&app, Method::GET, "/api/proxy/cities?search=%20", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "bad_request");

    let (status, body) =
        send(&app, Method::GET, "/api/proxy/cities?search=Lisbon", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["name"], "Lisbon");
    assert_eq!(body["results"][0]["region"], "Lisboa");
}

#[tokio::test]
async fn forgot_password_needs_a_known_email() {
    let (app, _root) = setup_test_app().await;
    signup(&app, "ana@example.com").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/forgot-password",
        None,
        Some(json!({ "email": "ana@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/forgot-password",
        None,
        Some(json!({ "email": "nobody@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/reset-password",
        None,
        Some(json!({ "token": "not-a-token", "newPassword": "whatever1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "bad_request");
}
