use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use appointment_cell::models::AppointmentError;
use notification_cell::models::NotificationError;
use shared_models::error::AppError;
use slot_cell::models::SlotError;

// ==============================================================================
// JOBS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    ReminderScan,
    WeeklySlotReset,
    NotificationCleanup,
    AutoComplete,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::ReminderScan,
        JobKind::WeeklySlotReset,
        JobKind::NotificationCleanup,
        JobKind::AutoComplete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::ReminderScan => "reminder_scan",
            JobKind::WeeklySlotReset => "weekly_slot_reset",
            JobKind::NotificationCleanup => "notification_cleanup",
            JobKind::AutoComplete => "auto_complete",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = MaintenanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| MaintenanceError::UnknownJob(s.to_string()))
    }
}

/// One record the job could not process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobFailure {
    pub record_id: Option<Uuid>,
    pub error: String,
}

/// Outcome of a single job run.
///
/// `skipped` counts records that needed no work, e.g. a reminder another
/// run had already claimed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job: JobKind,
    pub as_of: DateTime<Utc>,
    pub processed: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<JobFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobReport {
    pub fn start(job: JobKind, as_of: DateTime<Utc>) -> Self {
        let started_at = Utc::now();
        Self {
            job,
            as_of,
            processed: 0,
            succeeded: 0,
            skipped: 0,
            failed: 0,
            failures: Vec::new(),
            started_at,
            finished_at: started_at,
        }
    }

    pub fn record_success(&mut self) {
        self.processed += 1;
        self.succeeded += 1;
    }

    pub fn record_skip(&mut self) {
        self.processed += 1;
        self.skipped += 1;
    }

    pub fn record_failure(&mut self, record_id: Option<Uuid>, error: impl ToString) {
        self.processed += 1;
        self.failed += 1;
        self.failures.push(JobFailure {
            record_id,
            error: error.to_string(),
        });
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunJobQuery {
    /// Reference time for the run; defaults to the current time.
    pub now: Option<DateTime<Utc>>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum MaintenanceError {
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("Appointment error: {0}")]
    Appointment(#[from] AppointmentError),

    #[error("Slot error: {0}")]
    Slot(#[from] SlotError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),
}

impl From<MaintenanceError> for AppError {
    fn from(err: MaintenanceError) -> Self {
        match err {
            MaintenanceError::UnknownJob(name) => AppError::NotFound(format!("Unknown job: {}", name)),
            MaintenanceError::Appointment(e) => e.into(),
            MaintenanceError::Slot(e) => e.into(),
            MaintenanceError::Notification(e) => e.into(),
        }
    }
}
