use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::access::{ensure_allowed, AccessPolicy, AccessTarget};

use crate::models::{JobKind, RunJobQuery};
use crate::services::ScheduledJobRunner;

#[derive(Clone)]
pub struct MaintenanceState {
    pub runner: Arc<ScheduledJobRunner>,
    pub policy: Arc<dyn AccessPolicy>,
}

#[axum::debug_handler]
pub async fn list_jobs(
    State(state): State<MaintenanceState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_allowed(state.policy.as_ref(), &user, &AccessTarget::Operations).await?;

    let settings = state.runner.settings();
    Ok(Json(json!({
        "jobs": JobKind::ALL,
        "reminder_window_hours": [
            settings.reminder_window_start_hours,
            settings.reminder_window_end_hours
        ],
        "notification_retention_days": settings.notification_retention_days
    })))
}

#[axum::debug_handler]
pub async fn run_job(
    State(state): State<MaintenanceState>,
    Extension(user): Extension<User>,
    Path(job): Path<String>,
    Query(query): Query<RunJobQuery>,
) -> Result<Json<Value>, AppError> {
    ensure_allowed(state.policy.as_ref(), &user, &AccessTarget::Operations).await?;

    let job: JobKind = job.parse()?;
    let now = query.now.unwrap_or_else(Utc::now);
    let report = state.runner.run(job, now).await?;

    Ok(Json(json!(report)))
}
