use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::access::{ensure_allowed, AccessPolicy, AccessTarget};

use crate::models::{DeliveryStatus, NotificationQuery, NotificationRecord};
use crate::services::dispatcher::NotificationDispatcher;

#[derive(Clone)]
pub struct NotificationState {
    pub dispatcher: NotificationDispatcher,
    pub policy: Arc<dyn AccessPolicy>,
}

#[axum::debug_handler]
pub async fn list_notifications(
    State(state): State<NotificationState>,
    Extension(user): Extension<User>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Value>, AppError> {
    ensure_allowed(state.policy.as_ref(), &user, &AccessTarget::Operations).await?;

    let records: Vec<NotificationRecord> = match (query.appointment_id, query.status) {
        (Some(appointment_id), status) => state
            .dispatcher
            .get_by_appointment(appointment_id)
            .await?
            .into_iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .collect(),
        (None, status) => {
            state
                .dispatcher
                .get_by_status(status.unwrap_or(DeliveryStatus::Failed))
                .await?
        }
    };

    Ok(Json(json!({
        "notifications": records,
        "total": records.len()
    })))
}

#[axum::debug_handler]
pub async fn get_summary(
    State(state): State<NotificationState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_allowed(state.policy.as_ref(), &user, &AccessTarget::Operations).await?;

    let stats = state.dispatcher.statistics().await?;
    Ok(Json(json!(stats)))
}

#[axum::debug_handler]
pub async fn get_notification(
    State(state): State<NotificationState>,
    Extension(user): Extension<User>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    ensure_allowed(state.policy.as_ref(), &user, &AccessTarget::Operations).await?;

    let record = state.dispatcher.get(notification_id).await?;
    Ok(Json(json!(record)))
}

#[axum::debug_handler]
pub async fn retry_notification(
    State(state): State<NotificationState>,
    Extension(user): Extension<User>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    ensure_allowed(state.policy.as_ref(), &user, &AccessTarget::Operations).await?;

    let record = state.dispatcher.retry(notification_id).await?;
    Ok(Json(json!(record)))
}
