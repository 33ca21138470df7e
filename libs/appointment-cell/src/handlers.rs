use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{CallerRole, User};
use shared_models::error::AppError;
use shared_utils::access::{ensure_allowed, AccessPolicy, AccessTarget};

use crate::models::{
    Appointment, AppointmentQuery, AppointmentStatus, BookAppointmentRequest, CancelledBy,
    UpdateAppointmentRequest,
};
use crate::services::booking::BookingCoordinator;

#[derive(Clone)]
pub struct AppointmentState {
    pub coordinator: Arc<BookingCoordinator>,
    pub policy: Arc<dyn AccessPolicy>,
}

fn appointment_target(appointment: &Appointment) -> AccessTarget {
    AccessTarget::Appointment {
        provider_id: appointment.provider_id,
        requester_id: appointment.requester_id,
    }
}

fn with_transitions(state: &AppointmentState, appointment: &Appointment) -> Value {
    json!({
        "appointment": appointment,
        "allowed_transitions": state
            .coordinator
            .state_machine()
            .get_valid_transitions(appointment.status),
    })
}

/// Loads the appointment and checks the caller may act on it.
async fn load_authorized(
    state: &AppointmentState,
    user: &User,
    appointment_id: Uuid,
    target: fn(&Appointment) -> AccessTarget,
) -> Result<Appointment, AppError> {
    let appointment = state.coordinator.get(appointment_id).await?;
    ensure_allowed(state.policy.as_ref(), user, &target(&appointment)).await?;
    Ok(appointment)
}

fn provider_target(appointment: &Appointment) -> AccessTarget {
    AccessTarget::Provider(appointment.provider_id)
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let caller_id = user
        .uuid()
        .ok_or_else(|| AppError::Auth("Invalid user id in token".to_string()))?;
    let requester_id = match request.requester_id {
        Some(on_behalf) if user.is_admin() => on_behalf,
        _ => caller_id,
    };
    ensure_allowed(state.policy.as_ref(), &user, &AccessTarget::Requester(requester_id)).await?;

    let appointment = state.coordinator.book(requester_id, request).await?;
    Ok((StatusCode::CREATED, Json(with_transitions(&state, &appointment))))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = load_authorized(&state, &user, appointment_id, appointment_target).await?;
    Ok(Json(with_transitions(&state, &appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    load_authorized(&state, &user, appointment_id, appointment_target).await?;

    let appointment = state.coordinator.update_details(appointment_id, request).await?;
    Ok(Json(with_transitions(&state, &appointment)))
}

// ==============================================================================
// LIFECYCLE TRANSITIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    load_authorized(&state, &user, appointment_id, provider_target).await?;

    let appointment = state.coordinator.confirm(appointment_id).await?;
    Ok(Json(with_transitions(&state, &appointment)))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    load_authorized(&state, &user, appointment_id, provider_target).await?;

    let appointment = state.coordinator.complete(appointment_id).await?;
    Ok(Json(with_transitions(&state, &appointment)))
}

#[axum::debug_handler]
pub async fn mark_no_show(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    load_authorized(&state, &user, appointment_id, provider_target).await?;

    let appointment = state.coordinator.mark_no_show(appointment_id).await?;
    Ok(Json(with_transitions(&state, &appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    load_authorized(&state, &user, appointment_id, appointment_target).await?;

    let cancelled_by = match user.caller_role() {
        Some(CallerRole::Requester) => CancelledBy::Requester,
        Some(CallerRole::Provider) => CancelledBy::Provider,
        _ => CancelledBy::System,
    };

    let appointment = state.coordinator.cancel(appointment_id, cancelled_by).await?;
    Ok(Json(with_transitions(&state, &appointment)))
}

// ==============================================================================
// QUERIES
// ==============================================================================

#[axum::debug_handler]
pub async fn list_by_status(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Value>, AppError> {
    ensure_allowed(state.policy.as_ref(), &user, &AccessTarget::Operations).await?;

    let status = query.status.unwrap_or(AppointmentStatus::Pending);
    let appointments = state.coordinator.list_by_status(status).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn list_requester_appointments(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(requester_id): Path<Uuid>,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Value>, AppError> {
    ensure_allowed(state.policy.as_ref(), &user, &AccessTarget::Requester(requester_id)).await?;

    let appointments = state
        .coordinator
        .list_for_requester(requester_id, query.status)
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn list_provider_appointments(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(provider_id): Path<Uuid>,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Value>, AppError> {
    ensure_allowed(state.policy.as_ref(), &user, &AccessTarget::Provider(provider_id)).await?;

    let appointments = state
        .coordinator
        .list_for_provider(provider_id, query.status)
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn requester_summary(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(requester_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    ensure_allowed(state.policy.as_ref(), &user, &AccessTarget::Requester(requester_id)).await?;

    let summary = state.coordinator.requester_summary(requester_id).await?;
    Ok(Json(json!(summary)))
}

#[axum::debug_handler]
pub async fn provider_summary(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(provider_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    ensure_allowed(state.policy.as_ref(), &user, &AccessTarget::Provider(provider_id)).await?;

    let summary = state.coordinator.provider_summary(provider_id).await?;
    Ok(Json(json!(summary)))
}

#[axum::debug_handler]
pub async fn appointment_notifications(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    load_authorized(&state, &user, appointment_id, appointment_target).await?;

    let records = state
        .coordinator
        .notifier()
        .dispatcher()
        .get_by_appointment(appointment_id)
        .await?;

    Ok(Json(json!({
        "notifications": records,
        "total": records.len()
    })))
}
