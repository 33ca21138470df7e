use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use notification_cell::models::{Contact, NotificationError, NotificationKind, NotificationRecord, TemplateData};
use notification_cell::services::{ContactDirectory, NotificationDispatcher};

use crate::models::{Appointment, CancelledBy};

/// Turns lifecycle events into notifications for both parties.
#[derive(Clone)]
pub struct LifecycleNotifier {
    dispatcher: NotificationDispatcher,
    contacts: Arc<dyn ContactDirectory>,
}

struct Parties {
    requester: Option<Contact>,
    provider: Option<Contact>,
}

impl LifecycleNotifier {
    pub fn new(dispatcher: NotificationDispatcher, contacts: Arc<dyn ContactDirectory>) -> Self {
        Self { dispatcher, contacts }
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// Confirmation to the requester and an alert to the provider, in the background.
    pub fn booked(&self, appointment: &Appointment) -> JoinHandle<()> {
        let notifier = self.clone();
        let appointment = appointment.clone();

        tokio::spawn(async move {
            let parties = notifier.resolve(&appointment).await;
            notifier
                .send_pair(
                    &appointment,
                    &parties,
                    NotificationKind::AppointmentConfirmation,
                    NotificationKind::ProviderAlert,
                    None,
                )
                .await;
        })
    }

    /// Cancellation notice to both parties, in the background.
    pub fn cancelled(&self, appointment: &Appointment, cancelled_by: CancelledBy) -> JoinHandle<()> {
        let notifier = self.clone();
        let appointment = appointment.clone();

        tokio::spawn(async move {
            let parties = notifier.resolve(&appointment).await;
            notifier
                .send_pair(
                    &appointment,
                    &parties,
                    NotificationKind::AppointmentCancellation,
                    NotificationKind::AppointmentCancellation,
                    Some(cancelled_by),
                )
                .await;
        })
    }

    /// Reminder to the requester. Awaited so the caller can report the outcome.
    /// `Ok(None)` means the requester has no known address.
    pub async fn reminder(&self, appointment: &Appointment) -> Result<Option<NotificationRecord>, NotificationError> {
        let parties = self.resolve(appointment).await;
        let Some(requester) = parties.requester.as_ref() else {
            warn!("No contact for requester {}, reminder skipped", appointment.requester_id);
            return Ok(None);
        };

        let data = template_data(appointment, requester, parties.provider.as_ref(), None);
        self.dispatcher
            .dispatch(NotificationKind::AppointmentReminder, requester, &data, Some(appointment.id))
            .await
            .map(Some)
    }

    async fn resolve(&self, appointment: &Appointment) -> Parties {
        Parties {
            requester: self.lookup(appointment.requester_id).await,
            provider: self.lookup(appointment.provider_id).await,
        }
    }

    async fn lookup(&self, party_id: Uuid) -> Option<Contact> {
        match self.contacts.lookup(party_id).await {
            Ok(Some(contact)) => Some(contact),
            Ok(None) => {
                warn!("No contact found for party {}", party_id);
                None
            }
            Err(e) => {
                warn!("Contact lookup for {} failed: {}", party_id, e);
                None
            }
        }
    }

    async fn send_pair(
        &self,
        appointment: &Appointment,
        parties: &Parties,
        requester_kind: NotificationKind,
        provider_kind: NotificationKind,
        cancelled_by: Option<CancelledBy>,
    ) {
        let targets = [
            (requester_kind, parties.requester.as_ref(), parties.provider.as_ref()),
            (provider_kind, parties.provider.as_ref(), parties.requester.as_ref()),
        ];

        for (kind, recipient, counterpart) in targets {
            let Some(recipient) = recipient else {
                continue;
            };
            let data = template_data(appointment, recipient, counterpart, cancelled_by);
            match self
                .dispatcher
                .dispatch(kind, recipient, &data, Some(appointment.id))
                .await
            {
                Ok(record) => debug!("{:?} for {} ended as {:?}", kind, appointment.id, record.status),
                Err(e) => warn!("Could not record {:?} for {}: {}", kind, appointment.id, e),
            }
        }
    }
}

fn template_data(
    appointment: &Appointment,
    recipient: &Contact,
    counterpart: Option<&Contact>,
    cancelled_by: Option<CancelledBy>,
) -> TemplateData {
    TemplateData {
        recipient_name: recipient.name.clone(),
        counterpart_name: counterpart
            .map(|c| c.name.clone())
            .unwrap_or_else(|| "your counterpart".to_string()),
        date: appointment.scheduled_start.date_naive(),
        start_time: appointment.scheduled_start.time(),
        end_time: appointment.scheduled_end.time(),
        meeting_mode: appointment.meeting_mode.as_str().to_string(),
        notes: appointment.notes.clone(),
        cancelled_by: cancelled_by.map(|by| by.as_str().to_string()),
    }
}
