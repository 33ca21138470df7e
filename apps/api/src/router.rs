use std::sync::Arc;

use axum::{
    Json, Router,
    routing::get,
};
use serde_json::{json, Value};

use appointment_cell::router::appointment_routes;
use maintenance_cell::router::maintenance_routes;
use notification_cell::router::notification_routes;
use shared_config::AppConfig;
use slot_cell::router::slot_routes;

use crate::state::CellStates;

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub fn create_router(config: Arc<AppConfig>, states: CellStates) -> Router {
    Router::new()
        .route("/", get(health))
        .nest("/slots", slot_routes(config.clone(), states.slots))
        .nest("/appointments", appointment_routes(config.clone(), states.appointments))
        .nest("/notifications", notification_routes(config.clone(), states.notifications))
        .nest("/jobs", maintenance_routes(config, states.maintenance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn app() -> Router {
        let config = AppConfig {
            supabase_jwt_secret: "test-secret".to_string(),
            ..AppConfig::default()
        };
        let states = CellStates::from_config(&config);
        create_router(Arc::new(config), states)
    }

    #[tokio::test]
    async fn test_root_reports_health() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_cell_routes_require_authentication() {
        for uri in ["/slots/available", "/appointments", "/notifications/summary", "/jobs"] {
            let response = app()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }
}
