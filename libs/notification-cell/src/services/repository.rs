use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::models::{DeliveryStatus, NotificationError, NotificationRecord, NotificationStats};

const NOTIFICATIONS_TABLE: &str = "notifications";

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, record: NotificationRecord) -> Result<NotificationRecord, NotificationError>;

    async fn get(&self, id: Uuid) -> Result<Option<NotificationRecord>, NotificationError>;

    /// Persists the outcome fields of an attempt.
    async fn save_outcome(&self, record: &NotificationRecord) -> Result<NotificationRecord, NotificationError>;

    /// Moves a `failed` record back to `pending`. `None` if it was not failed.
    async fn claim_failed(&self, id: Uuid) -> Result<Option<NotificationRecord>, NotificationError>;

    async fn list_by_status(&self, status: DeliveryStatus) -> Result<Vec<NotificationRecord>, NotificationError>;

    async fn list_by_appointment(&self, appointment_id: Uuid) -> Result<Vec<NotificationRecord>, NotificationError>;

    async fn statistics(&self) -> Result<NotificationStats, NotificationError>;

    /// Deletes records created strictly before `cutoff`; returns how many.
    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<usize, NotificationError>;
}

// ==============================================================================
// IN-MEMORY BACKEND
// ==============================================================================

#[derive(Default, Clone)]
pub struct InMemoryNotificationRepository {
    records: Arc<RwLock<HashMap<Uuid, NotificationRecord>>>,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first(mut records: Vec<NotificationRecord>) -> Vec<NotificationRecord> {
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn insert(&self, record: NotificationRecord) -> Result<NotificationRecord, NotificationError> {
        self.records.write().await.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<NotificationRecord>, NotificationError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn save_outcome(&self, record: &NotificationRecord) -> Result<NotificationRecord, NotificationError> {
        let mut records = self.records.write().await;
        let stored = records.get_mut(&record.id).ok_or(NotificationError::NotFound)?;
        stored.status = record.status;
        stored.sent_at = record.sent_at;
        stored.error_message = record.error_message.clone();
        stored.attempts = record.attempts;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn claim_failed(&self, id: Uuid) -> Result<Option<NotificationRecord>, NotificationError> {
        let mut records = self.records.write().await;
        match records.get_mut(&id) {
            Some(stored) if stored.status == DeliveryStatus::Failed => {
                stored.status = DeliveryStatus::Pending;
                stored.updated_at = Utc::now();
                Ok(Some(stored.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_by_status(&self, status: DeliveryStatus) -> Result<Vec<NotificationRecord>, NotificationError> {
        let found = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        Ok(Self::newest_first(found))
    }

    async fn list_by_appointment(&self, appointment_id: Uuid) -> Result<Vec<NotificationRecord>, NotificationError> {
        let found = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.appointment_id == Some(appointment_id))
            .cloned()
            .collect();
        Ok(Self::newest_first(found))
    }

    async fn statistics(&self) -> Result<NotificationStats, NotificationError> {
        let records = self.records.read().await;
        let count = |status: DeliveryStatus| records.values().filter(|r| r.status == status).count();

        Ok(NotificationStats {
            total_sent: count(DeliveryStatus::Sent),
            total_failed: count(DeliveryStatus::Failed),
            total_pending: count(DeliveryStatus::Pending),
        })
    }

    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<usize, NotificationError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.created_at >= cutoff);
        Ok(before - records.len())
    }
}

// ==============================================================================
// POSTGREST BACKEND
// ==============================================================================

pub struct SupabaseNotificationRepository {
    client: Arc<SupabaseClient>,
}

impl SupabaseNotificationRepository {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        Self { client }
    }

    async fn count_status(&self, status: DeliveryStatus) -> Result<usize, NotificationError> {
        let query = format!("status=eq.{}&select=id", status.as_str());
        let rows: Vec<Value> = self.client.select(NOTIFICATIONS_TABLE, &query).await?;
        Ok(rows.len())
    }
}

#[async_trait]
impl NotificationRepository for SupabaseNotificationRepository {
    async fn insert(&self, record: NotificationRecord) -> Result<NotificationRecord, NotificationError> {
        let row = serde_json::to_value(&record)
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;
        Ok(self.client.insert(NOTIFICATIONS_TABLE, row).await?)
    }

    async fn get(&self, id: Uuid) -> Result<Option<NotificationRecord>, NotificationError> {
        let rows: Vec<NotificationRecord> = self
            .client
            .select(NOTIFICATIONS_TABLE, &format!("id=eq.{}", id))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn save_outcome(&self, record: &NotificationRecord) -> Result<NotificationRecord, NotificationError> {
        let changes = json!({
            "status": record.status,
            "sent_at": record.sent_at,
            "error_message": record.error_message,
            "attempts": record.attempts,
            "updated_at": Utc::now(),
        });
        let rows: Vec<NotificationRecord> = self
            .client
            .update(NOTIFICATIONS_TABLE, &format!("id=eq.{}", record.id), changes)
            .await?;
        rows.into_iter().next().ok_or(NotificationError::NotFound)
    }

    async fn claim_failed(&self, id: Uuid) -> Result<Option<NotificationRecord>, NotificationError> {
        let filter = format!("id=eq.{}&status=eq.failed", id);
        let changes = json!({ "status": DeliveryStatus::Pending, "updated_at": Utc::now() });
        let rows: Vec<NotificationRecord> = self.client.update(NOTIFICATIONS_TABLE, &filter, changes).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_by_status(&self, status: DeliveryStatus) -> Result<Vec<NotificationRecord>, NotificationError> {
        let query = format!("status=eq.{}&order=created_at.desc", status.as_str());
        Ok(self.client.select(NOTIFICATIONS_TABLE, &query).await?)
    }

    async fn list_by_appointment(&self, appointment_id: Uuid) -> Result<Vec<NotificationRecord>, NotificationError> {
        let query = format!("appointment_id=eq.{}&order=created_at.desc", appointment_id);
        Ok(self.client.select(NOTIFICATIONS_TABLE, &query).await?)
    }

    async fn statistics(&self) -> Result<NotificationStats, NotificationError> {
        Ok(NotificationStats {
            total_sent: self.count_status(DeliveryStatus::Sent).await?,
            total_failed: self.count_status(DeliveryStatus::Failed).await?,
            total_pending: self.count_status(DeliveryStatus::Pending).await?,
        })
    }

    async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<usize, NotificationError> {
        // `+` in an RFC 3339 offset would be read as a space in the query string.
        let filter = format!(
            "created_at=lt.{}&select=id",
            cutoff.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        let rows: Vec<Value> = self.client.delete(NOTIFICATIONS_TABLE, &filter).await?;
        Ok(rows.len())
    }
}
