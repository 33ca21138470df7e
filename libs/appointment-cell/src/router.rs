use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AppointmentState};

pub fn appointment_routes(config: Arc<AppConfig>, state: AppointmentState) -> Router {
    Router::new()
        // Booking and admin listing
        .route("/", post(handlers::book_appointment).get(handlers::list_by_status))

        // Per-party views
        .route("/requesters/{requester_id}", get(handlers::list_requester_appointments))
        .route("/requesters/{requester_id}/summary", get(handlers::requester_summary))
        .route("/providers/{provider_id}", get(handlers::list_provider_appointments))
        .route("/providers/{provider_id}/summary", get(handlers::provider_summary))

        // Single appointment
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment).patch(handlers::update_appointment),
        )
        .route("/{appointment_id}/confirm", post(handlers::confirm_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/no-show", post(handlers::mark_no_show))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/notifications", get(handlers::appointment_notifications))

        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
