use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, MaintenanceState};

pub fn maintenance_routes(config: Arc<AppConfig>, state: MaintenanceState) -> Router {
    Router::new()
        .route("/", get(handlers::list_jobs))
        .route("/{job}/run", post(handlers::run_job))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
