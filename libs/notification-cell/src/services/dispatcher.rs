use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::models::{
    Contact, DeliveryStatus, NotificationError, NotificationKind, NotificationRecord,
    NotificationStats, TemplateData,
};
use crate::services::repository::NotificationRepository;
use crate::services::templates::render;
use crate::services::transport::DeliveryTransport;

/// Records every outbound message and delivers it through the transport.
///
/// Delivery failures never surface as errors: they end up as `failed`
/// records that can be listed and retried. Only storage errors propagate.
#[derive(Clone)]
pub struct NotificationDispatcher {
    repository: Arc<dyn NotificationRepository>,
    transport: Arc<dyn DeliveryTransport>,
}

impl NotificationDispatcher {
    pub fn new(
        repository: Arc<dyn NotificationRepository>,
        transport: Arc<dyn DeliveryTransport>,
    ) -> Self {
        Self { repository, transport }
    }

    #[instrument(skip(self, recipient, data), fields(to = %recipient.email))]
    pub async fn dispatch(
        &self,
        kind: NotificationKind,
        recipient: &Contact,
        data: &TemplateData,
        appointment_id: Option<Uuid>,
    ) -> Result<NotificationRecord, NotificationError> {
        let message = render(kind, data);
        let record = NotificationRecord::pending(kind, recipient, &message, appointment_id);
        let record = self.repository.insert(record).await?;

        self.deliver(record).await
    }

    /// Runs `dispatch` on a background task.
    pub fn spawn_dispatch(
        &self,
        kind: NotificationKind,
        recipient: Contact,
        data: TemplateData,
        appointment_id: Option<Uuid>,
    ) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            if let Err(e) = dispatcher.dispatch(kind, &recipient, &data, appointment_id).await {
                error!("Failed to record {:?} notification for {}: {}", kind, recipient.email, e);
            }
        })
    }

    /// Re-sends a failed record in place.
    #[instrument(skip(self))]
    pub async fn retry(&self, id: Uuid) -> Result<NotificationRecord, NotificationError> {
        let current = self.get(id).await?;
        if current.status != DeliveryStatus::Failed {
            return Err(NotificationError::InvalidState(format!(
                "only failed notifications can be retried, this one is {}",
                current.status.as_str()
            )));
        }

        let claimed = self.repository.claim_failed(id).await?.ok_or_else(|| {
            NotificationError::InvalidState("notification is already being retried".to_string())
        })?;

        info!("Retrying notification {} (attempt {})", id, claimed.attempts + 1);
        self.deliver(claimed).await
    }

    async fn deliver(&self, mut record: NotificationRecord) -> Result<NotificationRecord, NotificationError> {
        record.attempts += 1;

        match self.transport.send(&record.message()).await {
            Ok(()) => {
                record.status = DeliveryStatus::Sent;
                record.sent_at = Some(Utc::now());
                record.error_message = None;
            }
            Err(e) => {
                warn!("Delivery of notification {} failed: {}", record.id, e);
                record.status = DeliveryStatus::Failed;
                record.error_message = Some(e.to_string());
            }
        }

        self.repository.save_outcome(&record).await
    }

    pub async fn get(&self, id: Uuid) -> Result<NotificationRecord, NotificationError> {
        self.repository.get(id).await?.ok_or(NotificationError::NotFound)
    }

    pub async fn get_by_status(&self, status: DeliveryStatus) -> Result<Vec<NotificationRecord>, NotificationError> {
        self.repository.list_by_status(status).await
    }

    pub async fn get_by_appointment(&self, appointment_id: Uuid) -> Result<Vec<NotificationRecord>, NotificationError> {
        self.repository.list_by_appointment(appointment_id).await
    }

    pub async fn statistics(&self) -> Result<NotificationStats, NotificationError> {
        self.repository.statistics().await
    }

    #[instrument(skip(self))]
    pub async fn purge_created_before(&self, cutoff: DateTime<Utc>) -> Result<usize, NotificationError> {
        let removed = self.repository.delete_created_before(cutoff).await?;
        info!("Purged {} notification records", removed);
        Ok(removed)
    }
}
