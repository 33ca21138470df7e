// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

use shared_database::SupabaseError;
use shared_models::error::AppError;
use slot_cell::models::{Slot, SlotError};

pub const MAX_NOTES_LENGTH: usize = 1000;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub provider_id: Uuid,
    pub slot_id: Uuid,
    pub status: AppointmentStatus,
    pub meeting_mode: MeetingMode,
    pub notes: Option<String>,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub reminder_sent: bool,
    pub cancelled_by: Option<CancelledBy>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// New `pending` appointment bound to `slot`; schedule and provider are copied from it.
    pub fn for_slot(
        slot: &Slot,
        requester_id: Uuid,
        meeting_mode: MeetingMode,
        notes: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            requester_id,
            provider_id: slot.provider_id,
            slot_id: slot.id,
            status: AppointmentStatus::Pending,
            meeting_mode,
            notes,
            scheduled_start: slot.starts_at(),
            scheduled_end: slot.ends_at(),
            reminder_sent: false,
            cancelled_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MeetingMode {
    Online,
    FaceToFace,
}

impl MeetingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingMode::Online => "online",
            MeetingMode::FaceToFace => "face_to_face",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    Requester,
    Provider,
    System,
}

impl CancelledBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelledBy::Requester => "requester",
            CancelledBy::Provider => "provider",
            CancelledBy::System => "system",
        }
    }
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub slot_id: Uuid,
    pub meeting_mode: MeetingMode,
    pub notes: Option<String>,
    /// Only honoured for admins booking on behalf of someone else.
    pub requester_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub meeting_mode: Option<MeetingMode>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentQuery {
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppointmentSummary {
    pub total: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub no_show: usize,
}

impl AppointmentSummary {
    pub fn from_appointments(appointments: &[Appointment]) -> Self {
        let mut summary = Self {
            total: appointments.len(),
            ..Self::default()
        };
        for appointment in appointments {
            match appointment.status {
                AppointmentStatus::Pending => summary.pending += 1,
                AppointmentStatus::Confirmed => summary.confirmed += 1,
                AppointmentStatus::Completed => summary.completed += 1,
                AppointmentStatus::Cancelled => summary.cancelled += 1,
                AppointmentStatus::NoShow => summary.no_show += 1,
            }
        }
        summary
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Slot not found")]
    SlotNotFound,

    #[error("Slot is already booked")]
    SlotAlreadyBooked,

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Appointment cannot be modified in current status: {0}")]
    NotModifiable(AppointmentStatus),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<SlotError> for AppointmentError {
    fn from(err: SlotError) -> Self {
        match err {
            SlotError::NotFound => AppointmentError::SlotNotFound,
            SlotError::Conflict(_) => AppointmentError::SlotAlreadyBooked,
            SlotError::InvalidState(msg) | SlotError::ValidationError(msg) => {
                AppointmentError::ValidationError(msg)
            }
            SlotError::DatabaseError(msg) => AppointmentError::DatabaseError(msg),
        }
    }
}

impl From<SupabaseError> for AppointmentError {
    fn from(err: SupabaseError) -> Self {
        match err {
            // Unique index on active appointments per slot.
            SupabaseError::Conflict(_) => AppointmentError::SlotAlreadyBooked,
            other => AppointmentError::DatabaseError(other.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound | AppointmentError::SlotNotFound => {
                AppError::NotFound(err.to_string())
            }
            AppointmentError::SlotAlreadyBooked => AppError::Conflict(err.to_string()),
            AppointmentError::InvalidStatusTransition { .. } | AppointmentError::NotModifiable(_) => {
                AppError::InvalidState(err.to_string())
            }
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

pub fn validate_notes(notes: Option<&str>) -> Result<(), AppointmentError> {
    match notes {
        Some(text) if text.chars().count() > MAX_NOTES_LENGTH => Err(AppointmentError::ValidationError(
            format!("notes must be at most {} characters", MAX_NOTES_LENGTH),
        )),
        _ => Ok(()),
    }
}
