use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use shared_utils::access::RoleBasedAccessPolicy;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};
use slot_cell::handlers::SlotState;
use slot_cell::router::slot_routes;
use slot_cell::services::{InMemorySlotRepository, SlotStore};

fn app(config: &TestConfig) -> Router {
    let state = SlotState {
        store: SlotStore::new(Arc::new(InMemorySlotRepository::new())),
        policy: Arc::new(RoleBasedAccessPolicy),
    };
    Router::new().nest("/slots", slot_routes(config.to_arc(), state))
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", token);
    }
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_requests_without_token_are_unauthorized() {
    let config = TestConfig::default();
    let app = app(&config);

    let (status, body) = send(&app, "GET", "/slots/available", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn test_provider_creates_and_lists_own_slots() {
    let config = TestConfig::default();
    let app = app(&config);
    let provider = TestUser::provider("provider@example.com");
    let token = JwtTestUtils::bearer(&provider, &config.jwt_secret);

    let payload = json!({
        "provider_id": provider.id,
        "day_of_week": 0,
        "start_time": "09:00:00",
        "end_time": "09:30:00",
        "week_start_date": "2024-01-01"
    });
    let (status, created) = send(&app, "POST", "/slots", Some(&token), Some(payload.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["is_booked"], false);

    let (status, body) = send(&app, "POST", "/slots", Some(&token), Some(payload)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let uri = format!("/slots/providers/{}?week_start_date=2024-01-01", provider.id);
    let (status, listed) = send(&app, "GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["total"], 1);
}

#[tokio::test]
async fn test_requester_cannot_create_slots_for_provider() {
    let config = TestConfig::default();
    let app = app(&config);
    let requester = TestUser::requester("requester@example.com");
    let token = JwtTestUtils::bearer(&requester, &config.jwt_secret);

    let payload = json!({
        "provider_id": Uuid::new_v4(),
        "day_of_week": 0,
        "start_time": "09:00:00",
        "end_time": "09:30:00",
        "week_start_date": "2024-01-01"
    });
    let (status, _) = send(&app, "POST", "/slots", Some(&token), Some(payload)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_bulk_endpoint_reports_created_and_skipped() {
    let config = TestConfig::default();
    let app = app(&config);
    let provider = TestUser::provider("provider@example.com");
    let token = JwtTestUtils::bearer(&provider, &config.jwt_secret);

    let payload = json!({
        "provider_id": provider.id,
        "week_start_date": "2024-01-01",
        "days_of_week": [0, 1],
        "start_time": "09:00:00",
        "end_time": "12:00:00",
        "slot_duration_minutes": 30,
        "break_minutes": 10,
        "lunch": { "start": "11:00:00", "end": "11:30:00" }
    });
    let (status, body) = send(&app, "POST", "/slots/bulk", Some(&token), Some(payload)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["created_count"], 6);
    assert_eq!(body["skipped"], 0);

    let (status, body) = send(&app, "GET", "/slots/available?week_start_date=2024-01-01", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 6);
}

#[tokio::test]
async fn test_bulk_endpoint_rejects_oversized_duration() {
    let config = TestConfig::default();
    let app = app(&config);
    let provider = TestUser::provider("provider@example.com");
    let token = JwtTestUtils::bearer(&provider, &config.jwt_secret);

    let payload = json!({
        "provider_id": provider.id,
        "week_start_date": "2024-01-01",
        "days_of_week": [0],
        "start_time": "09:00:00",
        "end_time": "12:00:00",
        "slot_duration_minutes": i64::MAX,
        "break_minutes": 0
    });
    let (status, body) = send(&app, "POST", "/slots/bulk", Some(&token), Some(payload)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");
}

#[tokio::test]
async fn test_unknown_slot_is_not_found() {
    let config = TestConfig::default();
    let app = app(&config);
    let token = JwtTestUtils::bearer(&TestUser::admin("admin@example.com"), &config.jwt_secret);

    let (status, body) = send(&app, "GET", &format!("/slots/{}", Uuid::new_v4()), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}
