//! HTTP-level tests for the Link-A API

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::{Days, Utc};
use link_a::api::{create_router, AppState};
use link_a::auth::StaticVerifier;
use link_a::db;
use link_a::models::AppConfig;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_env(&[]).await
    }

    async fn with_env(extra: &[(&str, &str)]) -> Self {
        let mut vars: HashMap<String, String> = HashMap::new();
        vars.insert("LINKA_ADMIN_EMAILS".into(), "admin@linka.co.mz".into());
        for (k, v) in extra {
            vars.insert(k.to_string(), v.to_string());
        }
        let config = AppConfig::from_map(&vars).unwrap();

        let verifier = StaticVerifier::new()
            .with_user("manager-token", "uid-manager", "manager@linka.co.mz")
            .with_user("driver-token", "uid-driver", "driver@linka.co.mz")
            .with_user("client-token", "uid-client", "client@linka.co.mz")
            .with_user("other-token", "uid-other", "other@linka.co.mz")
            .with_user("admin-token", "uid-admin", "admin@linka.co.mz");

        let pool = db::connect_in_memory().await.unwrap();
        let state = Arc::new(AppState::new(pool, config, Arc::new(verifier)));
        Self {
            router: create_router(state),
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, json)
    }

    async fn register(&self, token: &str, name: &str, roles: &[&str]) -> Value {
        let (status, _, body) = self
            .send(
                Method::POST,
                "/api/auth/register",
                Some(token),
                Some(json!({ "full_name": name, "roles": roles })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        body["data"].clone()
    }

    /// Manager with one hotel holding a single double room
    async fn hotel_with_one_room(&self) -> (String, String) {
        self.register("manager-token", "Ana Manager", &["hotel_manager"]).await;

        let (status, _, hotel) = self
            .send(
                Method::POST,
                "/api/hotels",
                Some("manager-token"),
                Some(json!({
                    "name": "Hotel Polana",
                    "address": "Av. Julius Nyerere 1380",
                    "city": "Maputo",
                    "province": "Maputo Cidade",
                    "star_rating": 5
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", hotel);
        let hotel_id = hotel["data"]["id"].as_str().unwrap().to_string();

        let (status, _, room) = self
            .send(
                Method::POST,
                &format!("/api/hotels/{}/room-types", hotel_id),
                Some("manager-token"),
                Some(json!({
                    "name": "Duplo",
                    "capacity": 2,
                    "base_price": 3500.0,
                    "total_units": 1
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", room);
        let room_id = room["data"]["id"].as_str().unwrap().to_string();

        (hotel_id, room_id)
    }
}

fn date_in(days: u64) -> String {
    (Utc::now().date_naive() + Days::new(days)).to_string()
}

fn hotel_booking(room_id: &str, from: u64, to: u64) -> Value {
    json!({
        "service_type": "hotel",
        "room_type_id": room_id,
        "check_in": date_in(from),
        "check_out": date_in(to),
        "guests": 2
    })
}

#[tokio::test]
async fn test_health_uses_envelope() {
    let app = TestApp::new().await;
    let (status, _, body) = app.send(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["database"], "ok");
    assert!(body["timestamp"].is_string());
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn test_unknown_route_is_enveloped_404() {
    let app = TestApp::new().await;
    let (status, _, body) = app.send(Method::GET, "/api/nothing-here", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "API_NOT_FOUND");
}

#[tokio::test]
async fn test_auth_failures() {
    let app = TestApp::new().await;

    let (status, _, body) = app.send(Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_UNAUTHORIZED");

    let (status, _, _) = app.send(Method::GET, "/api/auth/me", Some("forged"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // valid login, no account yet
    let (status, _, body) = app.send(Method::GET, "/api/auth/me", Some("client-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_NOT_REGISTERED");
}

#[tokio::test]
async fn test_register_and_profile() {
    let app = TestApp::new().await;

    let user = app.register("client-token", "Joana Client", &[]).await;
    assert_eq!(user["email"], "client@linka.co.mz");
    assert_eq!(user["roles"], json!(["client"]));

    let (status, _, body) = app
        .send(
            Method::POST,
            "/api/auth/register",
            Some("client-token"),
            Some(json!({ "full_name": "Joana Again" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "AUTH_ALREADY_REGISTERED");

    let (status, _, body) = app
        .send(
            Method::PUT,
            "/api/auth/me",
            Some("client-token"),
            Some(json!({ "phone": "84 123 4567" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phone"], "+258841234567");
}

#[tokio::test]
async fn test_admin_cannot_be_self_assigned() {
    let app = TestApp::new().await;
    let (status, _, body) = app
        .send(
            Method::POST,
            "/api/auth/register",
            Some("client-token"),
            Some(json!({ "full_name": "Sneaky", "roles": ["admin"] })),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "AUTH_FORBIDDEN");
}

#[tokio::test]
async fn test_stats_require_admin() {
    let app = TestApp::new().await;
    app.register("client-token", "Joana Client", &[]).await;
    let admin = app.register("admin-token", "Admin", &[]).await;
    assert!(admin["roles"].as_array().unwrap().contains(&json!("admin")));

    let (status, _, _) = app.send(Method::GET, "/api/stats", Some("client-token"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = app.send(Method::GET, "/api/stats", Some("admin-token"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["users_registered"], 2);
}

#[tokio::test]
async fn test_client_cannot_create_hotel() {
    let app = TestApp::new().await;
    app.register("client-token", "Joana Client", &[]).await;

    let (status, _, body) = app
        .send(
            Method::POST,
            "/api/hotels",
            Some("client-token"),
            Some(json!({
                "name": "Casa",
                "address": "Rua 1",
                "city": "Beira",
                "province": "Sofala"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_malformed_json_is_enveloped_400() {
    let app = TestApp::new().await;
    app.register("client-token", "Joana Client", &[]).await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/bookings")
        .header(header::AUTHORIZATION, "Bearer client-token")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "API_BAD_REQUEST");
}

#[tokio::test]
async fn test_hotel_overbooking_is_rejected() {
    let app = TestApp::new().await;
    let (hotel_id, room_id) = app.hotel_with_one_room().await;
    app.register("client-token", "Joana Client", &[]).await;
    app.register("other-token", "Pedro Other", &[]).await;

    let (status, _, first) = app
        .send(
            Method::POST,
            "/api/bookings",
            Some("client-token"),
            Some(hotel_booking(&room_id, 10, 12)),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", first);
    assert_eq!(first["data"]["status"], "confirmed");
    assert_eq!(first["data"]["total_price"], 7000.0);

    // overlapping stay for the last free unit
    let (status, _, body) = app
        .send(
            Method::POST,
            "/api/bookings",
            Some("other-token"),
            Some(hotel_booking(&room_id, 11, 13)),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "BOOKING_UNAVAILABLE");

    // checkout day is free again
    let (status, _, _) = app
        .send(
            Method::POST,
            "/api/bookings",
            Some("other-token"),
            Some(hotel_booking(&room_id, 12, 14)),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let uri = format!(
        "/api/hotels/{}/availability?check_in={}&check_out={}",
        hotel_id,
        date_in(10),
        date_in(11)
    );
    let (status, _, body) = app.send(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["room_types"][0]["available_units"], 0);
}

#[tokio::test]
async fn test_booking_visibility_and_cancel() {
    let app = TestApp::new().await;
    let (_, room_id) = app.hotel_with_one_room().await;
    app.register("client-token", "Joana Client", &[]).await;
    app.register("other-token", "Pedro Other", &[]).await;

    let (_, _, created) = app
        .send(
            Method::POST,
            "/api/bookings",
            Some("client-token"),
            Some(hotel_booking(&room_id, 20, 21)),
        )
        .await;
    let booking_id = created["data"]["id"].as_str().unwrap().to_string();
    let path = format!("/api/bookings/{}", booking_id);

    let (status, _, _) = app.send(Method::GET, &path, Some("other-token"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // the hotel manager sees bookings for their property
    let (status, _, _) = app.send(Method::GET, &path, Some("manager-token"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = app
        .send(Method::POST, &format!("{}/cancel", path), Some("client-token"), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["booking"]["status"], "cancelled");

    let (status, _, body) = app
        .send(Method::POST, &format!("{}/cancel", path), Some("client-token"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BOOKING_INVALID_STATE");

    let (status, _, body) = app.send(Method::GET, "/api/bookings", Some("client-token"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["total"], 1);
}

#[tokio::test]
async fn test_ride_publish_and_book() {
    let app = TestApp::new().await;
    app.register("driver-token", "Carlos Driver", &["driver"]).await;
    app.register("client-token", "Joana Client", &[]).await;

    let departure = (Utc::now() + chrono::Duration::days(2)).to_rfc3339();
    let (status, _, ride) = app
        .send(
            Method::POST,
            "/api/rides",
            Some("driver-token"),
            Some(json!({
                "origin": "Maputo",
                "destination": "Xai-Xai",
                "departure_at": departure,
                "total_seats": 2,
                "price_per_seat": 450.0
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", ride);
    let ride_id = ride["data"]["id"].as_str().unwrap().to_string();

    let (status, _, body) = app
        .send(
            Method::POST,
            "/api/bookings",
            Some("driver-token"),
            Some(json!({ "service_type": "ride", "ride_id": ride_id })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let (status, _, body) = app
        .send(
            Method::POST,
            "/api/bookings",
            Some("client-token"),
            Some(json!({ "service_type": "ride", "ride_id": ride_id, "seats": 3 })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);

    let (status, _, body) = app
        .send(
            Method::POST,
            "/api/bookings",
            Some("client-token"),
            Some(json!({ "service_type": "ride", "ride_id": ride_id, "seats": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["total_price"], 900.0);

    let (_, _, listing) = app
        .send(Method::GET, &format!("/api/rides/{}", ride_id), None, None)
        .await;
    assert_eq!(listing["data"]["seats_available"], 0);
}

#[tokio::test]
async fn test_reviews_flow() {
    let app = TestApp::new().await;
    let (hotel_id, room_id) = app.hotel_with_one_room().await;
    app.register("client-token", "Joana Client", &[]).await;
    app.register("other-token", "Pedro Other", &[]).await;

    app.send(
        Method::POST,
        "/api/bookings",
        Some("client-token"),
        Some(hotel_booking(&room_id, 3, 5)),
    )
    .await;

    let reviews_path = format!("/api/reviews/hotels/{}", hotel_id);
    let (status, _, review) = app
        .send(
            Method::POST,
            &reviews_path,
            Some("client-token"),
            Some(json!({ "rating": 5, "title": "Excelente", "comment": "Quarto limpo e pessoal simpático." })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", review);
    assert_eq!(review["data"]["is_verified"], true);
    assert_eq!(review["data"]["author_name"], "Joana Client");
    let review_id = review["data"]["id"].as_str().unwrap().to_string();

    let (status, _, body) = app
        .send(
            Method::POST,
            &reviews_path,
            Some("client-token"),
            Some(json!({ "rating": 4, "comment": "Segunda tentativa de avaliar." })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "REVIEW_DUPLICATE");

    let (status, _, _) = app
        .send(
            Method::POST,
            &reviews_path,
            Some("manager-token"),
            Some(json!({ "rating": 5, "comment": "O meu hotel é o melhor." })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = app
        .send(
            Method::POST,
            &reviews_path,
            Some("other-token"),
            Some(json!({ "rating": 3, "comment": "Razoável, sem reserva feita." })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["is_verified"], false);

    let (status, _, body) = app
        .send(Method::GET, &format!("{}?sort=lowest", reviews_path), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"][0]["rating"], 3);

    let (status, _, _) = app
        .send(Method::GET, &format!("{}?sort=sideways", reviews_path), None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, _, stats) = app
        .send(Method::GET, &format!("{}/stats", reviews_path), None, None)
        .await;
    assert_eq!(stats["data"]["total_reviews"], 2);
    assert_eq!(stats["data"]["average_rating"], 4.0);
    assert_eq!(stats["data"]["verified_reviews"], 1);

    let (status, _, body) = app
        .send(
            Method::POST,
            &format!("/api/reviews/{}/response", review_id),
            Some("manager-token"),
            Some(json!({ "response": "Obrigado pela visita!" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["manager_response"], "Obrigado pela visita!");

    let (status, _, _) = app
        .send(
            Method::POST,
            &format!("/api/reviews/{}/response", review_id),
            Some("other-token"),
            Some(json!({ "response": "Not my hotel" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = app
        .send(Method::POST, &format!("/api/reviews/{}/helpful", review_id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["helpful_count"], 1);

    let (_, _, hotel) = app
        .send(Method::GET, &format!("/api/hotels/{}", hotel_id), None, None)
        .await;
    assert_eq!(hotel["data"]["review_count"], 2);
}

#[tokio::test]
async fn test_rate_limit_headers_and_429() {
    let app = TestApp::with_env(&[("LINKA_RATE_LIMIT", "2")]).await;

    let (status, headers, _) = app.send(Method::GET, "/api/hotels", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-ratelimit-remaining"], "1");
    assert!(headers.contains_key("x-ratelimit-reset"));

    app.send(Method::GET, "/api/hotels", None, None).await;
    let (status, headers, body) = app.send(Method::GET, "/api/hotels", None, None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(headers.contains_key(header::RETRY_AFTER));
    assert_eq!(body["error"]["code"], "API_RATE_LIMITED");

    // health stays reachable for load balancer checks
    let (status, _, _) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}
