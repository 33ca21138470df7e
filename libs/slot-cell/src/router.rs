use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, SlotState};

pub fn slot_routes(config: Arc<AppConfig>, state: SlotState) -> Router {
    Router::new()
        .route("/", post(handlers::create_slot))
        .route("/bulk", post(handlers::bulk_create_slots))
        .route("/available", get(handlers::list_available_slots))
        .route("/providers/{provider_id}", get(handlers::list_provider_week))
        .route(
            "/{slot_id}",
            get(handlers::get_slot)
                .put(handlers::update_slot)
                .delete(handlers::delete_slot),
        )
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
