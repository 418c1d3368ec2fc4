use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use spacall::backend::local::{LocalBackend, LocalSessionProvider};
use spacall::backend::location::FixedLocationProvider;
use spacall::backend::SessionProvider;
use spacall::config::{AppConfig, BackendKind};
use spacall::handlers;
use spacall::models::{BookingStatus, Coordinate};
use spacall::services::lifecycle::{ActiveBookingCoordinator, ActiveBookingState, BookingEvent};
use spacall::state::AppState;

// ── Helpers ──

const HOME: Coordinate = Coordinate {
    latitude: 14.5995,
    longitude: 120.9842,
};

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        backend: BackendKind::Local,
        database_url: ":memory:".to_string(),
        supabase_url: String::new(),
        supabase_anon_key: String::new(),
        email: String::new(),
        password: String::new(),
        device_location: Some(HOME),
        location_permission_granted: true,
        dev_token: "test-token".to_string(),
    }
}

fn test_state_with(location_granted: bool) -> Arc<AppState> {
    let backend = Arc::new(LocalBackend::open(":memory:").unwrap());
    let sessions = Arc::new(LocalSessionProvider::new().with_account("ana@example.com", "secret"));
    let active = ActiveBookingCoordinator::new(backend.clone()).spawn(sessions.on_session_change());

    Arc::new(AppState {
        config: test_config(),
        sessions,
        bookings: backend.clone(),
        catalog: backend.clone(),
        location: Arc::new(FixedLocationProvider::new(Some(HOME), location_granted)),
        active,
        dev: Some(backend),
    })
}

fn test_state() -> Arc<AppState> {
    test_state_with(true)
}

fn test_app(state: Arc<AppState>) -> Router {
    handlers::router(state)
}

async fn body_json(res: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, json: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

fn dev_post(uri: &str, json: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("Authorization", "Bearer test-token")
        .body(Body::from(json.to_string()))
        .unwrap()
}

async fn sign_in(state: &Arc<AppState>) {
    let res = test_app(state.clone())
        .oneshot(post_json(
            "/api/auth/sign-in",
            serde_json::json!({"email": "ana@example.com", "password": "secret"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

async fn service_id(state: &Arc<AppState>, name: &str) -> String {
    let res = test_app(state.clone()).oneshot(get("/api/services")).await.unwrap();
    let json = body_json(res).await;
    json.as_array()
        .unwrap()
        .iter()
        .find(|s| s["name"] == name)
        .map(|s| s["id"].as_str().unwrap().to_string())
        .unwrap()
}

async fn checkout(state: &Arc<AppState>, service: &str) -> serde_json::Value {
    let id = service_id(state, service).await;
    let res = test_app(state.clone())
        .oneshot(post_json(
            "/api/checkout",
            serde_json::json!({"service_id": id, "payment_method": "CASH"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    body_json(res).await
}

async fn wait_for_state(state: &Arc<AppState>, predicate: impl FnMut(&ActiveBookingState) -> bool) {
    let mut rx = state.active.watch();
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for active booking state")
        .unwrap();
}

// ── Catalog ──

#[tokio::test]
async fn test_health() {
    let res = test_app(test_state()).oneshot(get("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["status"], "ok");
}

#[tokio::test]
async fn test_services_cheapest_first() {
    let res = test_app(test_state()).oneshot(get("/api/services")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    let services = json.as_array().unwrap();
    assert_eq!(services.len(), 5);
    assert_eq!(services[0]["name"], "Aromatherapy Upgrade");
    assert_eq!(services[0]["category"], "Add-on");
    let prices: Vec<f64> = services.iter().map(|s| s["price"].as_f64().unwrap()).collect();
    assert!(prices.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_featured_services() {
    let res = test_app(test_state()).oneshot(get("/api/services/featured")).await.unwrap();
    let json = body_json(res).await;
    let mut names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Deep Tissue", "Hot Stone Massage", "Swedish Massage"]);
}

#[tokio::test]
async fn test_unknown_service_not_found() {
    let res = test_app(test_state()).oneshot(get("/api/services/nope")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

// ── Auth ──

#[tokio::test]
async fn test_sign_in_requires_fields() {
    let res = test_app(test_state())
        .oneshot(post_json(
            "/api/auth/sign-in",
            serde_json::json!({"email": "ana@example.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"], "Please fill in all fields");
}

#[tokio::test]
async fn test_sign_in_bad_password() {
    let res = test_app(test_state())
        .oneshot(post_json(
            "/api/auth/sign-in",
            serde_json::json!({"email": "ana@example.com", "password": "nope"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(res).await["error"], "Invalid login credentials");
}

#[tokio::test]
async fn test_session_round_trip() {
    let state = test_state();

    let res = test_app(state.clone()).oneshot(get("/api/auth/session")).await.unwrap();
    assert!(body_json(res).await["session"].is_null());

    sign_in(&state).await;
    let res = test_app(state.clone()).oneshot(get("/api/auth/session")).await.unwrap();
    assert_eq!(body_json(res).await["session"]["user"]["email"], "ana@example.com");

    let res = test_app(state.clone())
        .oneshot(post_json("/api/auth/sign-out", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = test_app(state.clone()).oneshot(get("/api/auth/session")).await.unwrap();
    assert!(body_json(res).await["session"].is_null());
}

#[tokio::test]
async fn test_sign_up_signs_in() {
    let state = test_state();
    let res = test_app(state.clone())
        .oneshot(post_json(
            "/api/auth/sign-up",
            serde_json::json!({"email": "new@example.com", "password": "pw"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["outcome"], "signed_in");
    assert_eq!(json["session"]["user"]["email"], "new@example.com");

    let res = test_app(state).oneshot(get("/api/auth/profile")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let profile = body_json(res).await;
    assert_eq!(profile["role"], "CLIENT");
    assert_eq!(profile["full_name"], "New User");
}

#[tokio::test]
async fn test_profile_requires_session() {
    let res = test_app(test_state()).oneshot(get("/api/auth/profile")).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

// ── Checkout ──

#[tokio::test]
async fn test_checkout_requires_session() {
    let state = test_state();
    let id = service_id(&state, "Thai Massage").await;
    let res = test_app(state)
        .oneshot(post_json("/api/checkout", serde_json::json!({"service_id": id})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(res).await["error"], "User not logged in");
}

#[tokio::test]
async fn test_checkout_requires_location() {
    let state = test_state_with(false);
    sign_in(&state).await;
    let id = service_id(&state, "Thai Massage").await;
    let res = test_app(state)
        .oneshot(post_json("/api/checkout", serde_json::json!({"service_id": id})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(res).await["error"],
        "We need your location to send a therapist."
    );
}

#[tokio::test]
async fn test_checkout_creates_active_booking() {
    let state = test_state();
    sign_in(&state).await;

    let booking = checkout(&state, "Thai Massage").await;
    assert_eq!(booking["status"], "PENDING");
    assert_eq!(booking["service_type"], "Thai Massage");
    assert_eq!(booking["total_price"], 899.0);
    assert_eq!(booking["payment_method"], "CASH");
    assert_eq!(booking["location"]["address"], "Pinned Location");

    wait_for_state(&state, |s| s.booking.is_some()).await;

    let res = test_app(state.clone()).oneshot(get("/api/bookings/active")).await.unwrap();
    let json = body_json(res).await;
    assert_eq!(json["booking"]["id"], booking["id"]);
    assert_eq!(json["loading"], false);
    assert_eq!(json["display"]["status"]["title"], "Finding a therapist...");
    assert_eq!(json["display"]["status"]["trackable"], false);
    assert_eq!(json["display"]["therapist_name"], "Therapist");
    assert_eq!(
        json["display"]["step"]["dots"],
        serde_json::json!([true, false, false, false, false])
    );
}

// ── Lifecycle ──

#[tokio::test]
async fn test_dev_controls_require_auth() {
    let res = test_app(test_state())
        .oneshot(post_json(
            "/api/dev/bookings/x/status",
            serde_json::json!({"status": "ACCEPTED"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_dev_rejects_unknown_status() {
    let state = test_state();
    sign_in(&state).await;
    let booking = checkout(&state, "Swedish Massage").await;
    let id = booking["id"].as_str().unwrap();

    let res = test_app(state)
        .oneshot(dev_post(
            &format!("/api/dev/bookings/{id}/status"),
            serde_json::json!({"status": "REFUNDED"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_booking_lifecycle_to_completion() {
    let state = test_state();
    sign_in(&state).await;
    let booking = checkout(&state, "Deep Tissue").await;
    let id = booking["id"].as_str().unwrap().to_string();
    wait_for_state(&state, |s| s.booking.is_some()).await;

    let mut events = state.active.subscribe_events();

    let res = test_app(state.clone())
        .oneshot(dev_post(
            &format!("/api/dev/bookings/{id}/therapist"),
            serde_json::json!({"therapist_id": "th-1", "therapist_name": "Maria"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    for status in ["ACCEPTED", "ON_WAY"] {
        let res = test_app(state.clone())
            .oneshot(dev_post(
                &format!("/api/dev/bookings/{id}/status"),
                serde_json::json!({ "status": status }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    wait_for_state(&state, |s| {
        s.booking.as_ref().map(|b| b.status) == Some(BookingStatus::OnWay)
    })
    .await;

    let res = test_app(state.clone()).oneshot(get("/api/bookings/active")).await.unwrap();
    let json = body_json(res).await;
    assert_eq!(json["display"]["status"]["title"], "Therapist is on the way!");
    assert_eq!(json["display"]["therapist_name"], "Maria");
    assert_eq!(json["booking"]["service_type"], "Deep Tissue");

    let res = test_app(state.clone())
        .oneshot(dev_post(
            &format!("/api/dev/bookings/{id}/status"),
            serde_json::json!({"status": "COMPLETED"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let completed = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Ok(BookingEvent::Completed { booking_id }) = events.recv().await {
                return booking_id;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(completed, id);

    let res = test_app(state.clone()).oneshot(get("/api/bookings/active")).await.unwrap();
    let json = body_json(res).await;
    assert!(json["booking"].is_null());
    assert!(json["display"].is_null());
}

#[tokio::test]
async fn test_sign_out_clears_active_booking() {
    let state = test_state();
    sign_in(&state).await;
    checkout(&state, "Thai Massage").await;
    wait_for_state(&state, |s| s.booking.is_some()).await;

    state.sessions.sign_out().await.unwrap();
    wait_for_state(&state, |s| s.booking.is_none()).await;
}

// ── Tracking ──

#[tokio::test]
async fn test_tracking_without_booking() {
    let res = test_app(test_state()).oneshot(get("/api/tracking")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tracking_not_available_while_pending() {
    let state = test_state();
    sign_in(&state).await;
    checkout(&state, "Thai Massage").await;
    wait_for_state(&state, |s| s.booking.is_some()).await;

    let res = test_app(state).oneshot(get("/api/tracking")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tracking_opens_stream_once_accepted() {
    let state = test_state();
    sign_in(&state).await;
    let booking = checkout(&state, "Thai Massage").await;
    let id = booking["id"].as_str().unwrap().to_string();

    let res = test_app(state.clone())
        .oneshot(dev_post(
            &format!("/api/dev/bookings/{id}/status"),
            serde_json::json!({"status": "ACCEPTED"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    wait_for_state(&state, |s| {
        s.booking.as_ref().map(|b| b.status) == Some(BookingStatus::Accepted)
    })
    .await;

    let res = test_app(state).oneshot(get("/api/tracking")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
}

#[tokio::test]
async fn test_tracking_stream_ends_with_booking() {
    let state = test_state();
    sign_in(&state).await;
    let booking = checkout(&state, "Thai Massage").await;
    let id = booking["id"].as_str().unwrap().to_string();

    test_app(state.clone())
        .oneshot(dev_post(
            &format!("/api/dev/bookings/{id}/status"),
            serde_json::json!({"status": "ON_WAY"}),
        ))
        .await
        .unwrap();
    wait_for_state(&state, |s| {
        s.booking.as_ref().map(|b| b.status) == Some(BookingStatus::OnWay)
    })
    .await;

    let res = test_app(state.clone()).oneshot(get("/api/tracking")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    test_app(state.clone())
        .oneshot(dev_post(
            &format!("/api/dev/bookings/{id}/status"),
            serde_json::json!({"status": "COMPLETED"}),
        ))
        .await
        .unwrap();

    let body = tokio::time::timeout(
        Duration::from_secs(2),
        axum::body::to_bytes(res.into_body(), usize::MAX),
    )
    .await
    .expect("tracking stream did not end after completion")
    .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("event: proximity"));
    assert!(text.contains("\"distance_label\":\"--\""));
}
