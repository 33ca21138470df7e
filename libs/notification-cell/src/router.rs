use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, NotificationState};

pub fn notification_routes(config: Arc<AppConfig>, state: NotificationState) -> Router {
    Router::new()
        .route("/", get(handlers::list_notifications))
        .route("/summary", get(handlers::get_summary))
        .route("/{notification_id}", get(handlers::get_notification))
        .route("/{notification_id}/retry", post(handlers::retry_notification))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
