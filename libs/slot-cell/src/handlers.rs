use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::access::{ensure_allowed, AccessPolicy, AccessTarget};

use crate::models::{BulkCreateSlotsRequest, CreateSlotRequest, SlotQuery, UpdateSlotRequest};
use crate::services::store::SlotStore;

#[derive(Clone)]
pub struct SlotState {
    pub store: SlotStore,
    pub policy: Arc<dyn AccessPolicy>,
}

#[derive(Debug, Deserialize)]
pub struct WeekQuery {
    pub week_start_date: NaiveDate,
    pub day_of_week: Option<i32>,
}

#[axum::debug_handler]
pub async fn create_slot(
    State(state): State<SlotState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateSlotRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    ensure_allowed(state.policy.as_ref(), &user, &AccessTarget::Provider(request.provider_id)).await?;

    let slot = state.store.create_slot(request).await?;
    Ok((StatusCode::CREATED, Json(json!(slot))))
}

#[axum::debug_handler]
pub async fn bulk_create_slots(
    State(state): State<SlotState>,
    Extension(user): Extension<User>,
    Json(request): Json<BulkCreateSlotsRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    ensure_allowed(state.policy.as_ref(), &user, &AccessTarget::Provider(request.provider_id)).await?;

    let result = state.store.bulk_create(request.provider_id, &request.pattern).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "created": result.created,
            "created_count": result.created.len(),
            "skipped": result.skipped,
        })),
    ))
}

#[axum::debug_handler]
pub async fn list_available_slots(
    State(state): State<SlotState>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let slots = state
        .store
        .available_slots(query.provider_id, query.week_start_date)
        .await?;

    Ok(Json(json!({
        "slots": slots,
        "total": slots.len()
    })))
}

#[axum::debug_handler]
pub async fn list_provider_week(
    State(state): State<SlotState>,
    Extension(user): Extension<User>,
    Path(provider_id): Path<Uuid>,
    Query(query): Query<WeekQuery>,
) -> Result<Json<Value>, AppError> {
    ensure_allowed(state.policy.as_ref(), &user, &AccessTarget::Provider(provider_id)).await?;

    let slots = state
        .store
        .slots_for_week(provider_id, query.week_start_date, query.day_of_week)
        .await?;

    Ok(Json(json!({
        "slots": slots,
        "total": slots.len()
    })))
}

#[axum::debug_handler]
pub async fn get_slot(
    State(state): State<SlotState>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let slot = state.store.get_slot(slot_id).await?;
    Ok(Json(json!(slot)))
}

#[axum::debug_handler]
pub async fn update_slot(
    State(state): State<SlotState>,
    Extension(user): Extension<User>,
    Path(slot_id): Path<Uuid>,
    Json(request): Json<UpdateSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let slot = state.store.get_slot(slot_id).await?;
    ensure_allowed(state.policy.as_ref(), &user, &AccessTarget::Provider(slot.provider_id)).await?;

    let updated = state.store.update_slot(slot_id, request).await?;
    Ok(Json(json!(updated)))
}

#[axum::debug_handler]
pub async fn delete_slot(
    State(state): State<SlotState>,
    Extension(user): Extension<User>,
    Path(slot_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let slot = state.store.get_slot(slot_id).await?;
    ensure_allowed(state.policy.as_ref(), &user, &AccessTarget::Provider(slot.provider_id)).await?;

    state.store.delete_slot(slot_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
