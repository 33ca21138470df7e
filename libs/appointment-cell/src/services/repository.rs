use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, CancelledBy, UpdateAppointmentRequest,
};

const APPOINTMENTS_TABLE: &str = "appointments";

/// Appointment storage. Status and reminder changes are compare-and-swap:
/// they apply only if the stored value still matches what the caller saw.
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, AppointmentError>;

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    /// The non-cancelled appointment bound to a slot, if any.
    async fn find_active_for_slot(&self, slot_id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    async fn update_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        new: AppointmentStatus,
        cancelled_by: Option<CancelledBy>,
    ) -> Result<Option<Appointment>, AppointmentError>;

    /// Applies notes / meeting mode while the appointment is pending or confirmed.
    async fn update_details(
        &self,
        id: Uuid,
        changes: &UpdateAppointmentRequest,
    ) -> Result<Option<Appointment>, AppointmentError>;

    /// Flips `reminder_sent` false -> true on a confirmed appointment.
    async fn mark_reminder_sent(&self, id: Uuid) -> Result<bool, AppointmentError>;

    async fn list_by_requester(
        &self,
        requester_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    async fn list_by_provider(
        &self,
        provider_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    async fn list_by_status(&self, status: AppointmentStatus) -> Result<Vec<Appointment>, AppointmentError>;

    /// Confirmed, not yet reminded, starting within `[from, to]`.
    async fn list_due_reminders(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    /// Confirmed appointments whose scheduled end is before `now`.
    async fn list_confirmed_ended_before(&self, now: DateTime<Utc>) -> Result<Vec<Appointment>, AppointmentError>;
}

// ==============================================================================
// IN-MEMORY BACKEND
// ==============================================================================

#[derive(Default, Clone)]
pub struct InMemoryAppointmentRepository {
    appointments: Arc<RwLock<HashMap<Uuid, Appointment>>>,
}

impl InMemoryAppointmentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn filtered<F>(&self, predicate: F) -> Vec<Appointment>
    where
        F: Fn(&Appointment) -> bool,
    {
        let mut found: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| predicate(a))
            .cloned()
            .collect();
        found.sort_by_key(|a| a.scheduled_start);
        found
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.write().await;
        let slot_taken = appointments
            .values()
            .any(|a| a.slot_id == appointment.slot_id && a.is_active());
        if slot_taken || appointments.contains_key(&appointment.id) {
            return Err(AppointmentError::SlotAlreadyBooked);
        }
        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn find_active_for_slot(&self, slot_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self
            .appointments
            .read()
            .await
            .values()
            .find(|a| a.slot_id == slot_id && a.is_active())
            .cloned())
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        new: AppointmentStatus,
        cancelled_by: Option<CancelledBy>,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let mut appointments = self.appointments.write().await;
        match appointments.get_mut(&id) {
            Some(stored) if stored.status == expected => {
                stored.status = new;
                if cancelled_by.is_some() {
                    stored.cancelled_by = cancelled_by;
                }
                stored.updated_at = Utc::now();
                Ok(Some(stored.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn update_details(
        &self,
        id: Uuid,
        changes: &UpdateAppointmentRequest,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let mut appointments = self.appointments.write().await;
        match appointments.get_mut(&id) {
            Some(stored)
                if matches!(stored.status, AppointmentStatus::Pending | AppointmentStatus::Confirmed) =>
            {
                if let Some(mode) = changes.meeting_mode {
                    stored.meeting_mode = mode;
                }
                if let Some(notes) = &changes.notes {
                    stored.notes = Some(notes.clone());
                }
                stored.updated_at = Utc::now();
                Ok(Some(stored.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_reminder_sent(&self, id: Uuid) -> Result<bool, AppointmentError> {
        let mut appointments = self.appointments.write().await;
        match appointments.get_mut(&id) {
            Some(stored) if stored.status == AppointmentStatus::Confirmed && !stored.reminder_sent => {
                stored.reminder_sent = true;
                stored.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_by_requester(
        &self,
        requester_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self
            .filtered(|a| a.requester_id == requester_id && status.map_or(true, |s| a.status == s))
            .await)
    }

    async fn list_by_provider(
        &self,
        provider_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self
            .filtered(|a| a.provider_id == provider_id && status.map_or(true, |s| a.status == s))
            .await)
    }

    async fn list_by_status(&self, status: AppointmentStatus) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self.filtered(|a| a.status == status).await)
    }

    async fn list_due_reminders(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self
            .filtered(|a| {
                a.status == AppointmentStatus::Confirmed
                    && !a.reminder_sent
                    && a.scheduled_start >= from
                    && a.scheduled_start <= to
            })
            .await)
    }

    async fn list_confirmed_ended_before(&self, now: DateTime<Utc>) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self
            .filtered(|a| a.status == AppointmentStatus::Confirmed && a.scheduled_end < now)
            .await)
    }
}

// ==============================================================================
// POSTGREST BACKEND
// ==============================================================================

pub struct SupabaseAppointmentRepository {
    client: Arc<SupabaseClient>,
}

impl SupabaseAppointmentRepository {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        Self { client }
    }

    async fn patch_one(&self, filter: &str, changes: Value) -> Result<Option<Appointment>, AppointmentError> {
        let rows: Vec<Appointment> = self.client.update(APPOINTMENTS_TABLE, filter, changes).await?;
        debug!("PATCH {} matched {} appointments", filter, rows.len());
        Ok(rows.into_iter().next())
    }
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn status_filter(status: Option<AppointmentStatus>) -> String {
    status
        .map(|s| format!("&status=eq.{}", s.as_str()))
        .unwrap_or_default()
}

#[async_trait]
impl AppointmentRepository for SupabaseAppointmentRepository {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let row = serde_json::to_value(&appointment)
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;
        Ok(self.client.insert(APPOINTMENTS_TABLE, row).await?)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let rows: Vec<Appointment> = self
            .client
            .select(APPOINTMENTS_TABLE, &format!("id=eq.{}", id))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn find_active_for_slot(&self, slot_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let query = format!("slot_id=eq.{}&status=neq.cancelled&limit=1", slot_id);
        let rows: Vec<Appointment> = self.client.select(APPOINTMENTS_TABLE, &query).await?;
        Ok(rows.into_iter().next())
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        new: AppointmentStatus,
        cancelled_by: Option<CancelledBy>,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let filter = format!("id=eq.{}&status=eq.{}", id, expected.as_str());
        let mut changes = json!({ "status": new, "updated_at": Utc::now() });
        if let Some(by) = cancelled_by {
            changes["cancelled_by"] = json!(by);
        }
        self.patch_one(&filter, changes).await
    }

    async fn update_details(
        &self,
        id: Uuid,
        changes: &UpdateAppointmentRequest,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let filter = format!("id=eq.{}&status=in.(pending,confirmed)", id);

        let mut body = Map::new();
        if let Some(mode) = changes.meeting_mode {
            body.insert("meeting_mode".to_string(), json!(mode));
        }
        if let Some(notes) = &changes.notes {
            body.insert("notes".to_string(), json!(notes));
        }
        body.insert("updated_at".to_string(), json!(Utc::now()));

        self.patch_one(&filter, Value::Object(body)).await
    }

    async fn mark_reminder_sent(&self, id: Uuid) -> Result<bool, AppointmentError> {
        let filter = format!("id=eq.{}&status=eq.confirmed&reminder_sent=eq.false", id);
        let changes = json!({ "reminder_sent": true, "updated_at": Utc::now() });
        Ok(self.patch_one(&filter, changes).await?.is_some())
    }

    async fn list_by_requester(
        &self,
        requester_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let query = format!(
            "requester_id=eq.{}{}&order=scheduled_start.asc",
            requester_id,
            status_filter(status)
        );
        Ok(self.client.select(APPOINTMENTS_TABLE, &query).await?)
    }

    async fn list_by_provider(
        &self,
        provider_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let query = format!(
            "provider_id=eq.{}{}&order=scheduled_start.asc",
            provider_id,
            status_filter(status)
        );
        Ok(self.client.select(APPOINTMENTS_TABLE, &query).await?)
    }

    async fn list_by_status(&self, status: AppointmentStatus) -> Result<Vec<Appointment>, AppointmentError> {
        let query = format!("status=eq.{}&order=scheduled_start.asc", status.as_str());
        Ok(self.client.select(APPOINTMENTS_TABLE, &query).await?)
    }

    async fn list_due_reminders(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let query = format!(
            "status=eq.confirmed&reminder_sent=eq.false&scheduled_start=gte.{}&scheduled_start=lte.{}",
            timestamp(from),
            timestamp(to)
        );
        Ok(self.client.select(APPOINTMENTS_TABLE, &query).await?)
    }

    async fn list_confirmed_ended_before(&self, now: DateTime<Utc>) -> Result<Vec<Appointment>, AppointmentError> {
        let query = format!("status=eq.confirmed&scheduled_end=lt.{}", timestamp(now));
        Ok(self.client.select(APPOINTMENTS_TABLE, &query).await?)
    }
}
