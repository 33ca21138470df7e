use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::SupabaseError;
use shared_models::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AppointmentConfirmation,
    AppointmentCancellation,
    AppointmentReminder,
    ProviderAlert,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }
}

/// Log entry for one outbound message and the outcome of its latest attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub recipient_email: String,
    pub recipient_name: String,
    pub notification_type: NotificationKind,
    pub status: DeliveryStatus,
    pub subject: String,
    pub content: String,
    pub html_content: String,
    pub appointment_id: Option<Uuid>,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationRecord {
    pub fn pending(
        kind: NotificationKind,
        recipient: &Contact,
        message: &RenderedMessage,
        appointment_id: Option<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            recipient_email: recipient.email.clone(),
            recipient_name: recipient.name.clone(),
            notification_type: kind,
            status: DeliveryStatus::Pending,
            subject: message.subject.clone(),
            content: message.text.clone(),
            html_content: message.html.clone(),
            appointment_id,
            sent_at: None,
            error_message: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn message(&self) -> OutboundMessage {
        OutboundMessage {
            to: self.recipient_email.clone(),
            subject: self.subject.clone(),
            html: self.html_content.clone(),
            text: self.content.clone(),
        }
    }
}

/// Address and display name of a party.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contact {
    pub email: String,
    pub name: String,
}

/// Values substituted into a message template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateData {
    pub recipient_name: String,
    pub counterpart_name: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub meeting_mode: String,
    pub notes: Option<String>,
    pub cancelled_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationStats {
    pub total_sent: usize,
    pub total_failed: usize,
    pub total_pending: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationQuery {
    pub status: Option<DeliveryStatus>,
    pub appointment_id: Option<Uuid>,
}

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Notification not found")]
    NotFound,

    #[error("Invalid notification state: {0}")]
    InvalidState(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<SupabaseError> for NotificationError {
    fn from(err: SupabaseError) -> Self {
        NotificationError::DatabaseError(err.to_string())
    }
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotFound => AppError::NotFound("Notification not found".to_string()),
            NotificationError::InvalidState(msg) => AppError::InvalidState(msg),
            NotificationError::Delivery(msg) => AppError::Internal(msg),
            NotificationError::ValidationError(msg) => AppError::ValidationError(msg),
            NotificationError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
