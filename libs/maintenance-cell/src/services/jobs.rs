// libs/maintenance-cell/src/services/jobs.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument, warn};

use appointment_cell::services::{BookingCoordinator, ReminderOutcome};
use notification_cell::models::DeliveryStatus;
use notification_cell::services::NotificationDispatcher;
use shared_config::AppConfig;
use slot_cell::models::week_start_of;
use slot_cell::services::SlotStore;

use crate::models::{JobKind, JobReport, MaintenanceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSettings {
    pub reminder_window_start_hours: i64,
    pub reminder_window_end_hours: i64,
    pub notification_retention_days: i64,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            reminder_window_start_hours: 23,
            reminder_window_end_hours: 25,
            notification_retention_days: 30,
        }
    }
}

impl JobSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            reminder_window_start_hours: config.reminder_window_start_hours,
            reminder_window_end_hours: config.reminder_window_end_hours,
            notification_retention_days: config.notification_retention_days,
        }
    }
}

/// Periodic housekeeping. Every job is idempotent and takes the reference
/// time explicitly; scheduling is left to whoever calls `run`.
pub struct ScheduledJobRunner {
    coordinator: Arc<BookingCoordinator>,
    slots: SlotStore,
    dispatcher: NotificationDispatcher,
    settings: JobSettings,
}

impl ScheduledJobRunner {
    pub fn new(
        coordinator: Arc<BookingCoordinator>,
        slots: SlotStore,
        dispatcher: NotificationDispatcher,
        settings: JobSettings,
    ) -> Self {
        Self {
            coordinator,
            slots,
            dispatcher,
            settings,
        }
    }

    pub fn settings(&self) -> JobSettings {
        self.settings
    }

    pub async fn run(&self, job: JobKind, now: DateTime<Utc>) -> Result<JobReport, MaintenanceError> {
        info!("Running job {} as of {}", job, now);

        let report = match job {
            JobKind::ReminderScan => self.reminder_scan(now).await?,
            JobKind::WeeklySlotReset => self.weekly_slot_reset(now).await?,
            JobKind::NotificationCleanup => self.notification_cleanup(now).await?,
            JobKind::AutoComplete => self.auto_complete(now).await?,
        };

        info!(
            "Job {} finished: {} processed, {} succeeded, {} skipped, {} failed",
            job, report.processed, report.succeeded, report.skipped, report.failed
        );
        Ok(report)
    }

    /// Reminds requesters of confirmed appointments starting inside the window.
    #[instrument(skip(self))]
    pub async fn reminder_scan(&self, now: DateTime<Utc>) -> Result<JobReport, MaintenanceError> {
        let mut report = JobReport::start(JobKind::ReminderScan, now);
        let from = now + Duration::hours(self.settings.reminder_window_start_hours);
        let to = now + Duration::hours(self.settings.reminder_window_end_hours);

        let due = self.coordinator.due_reminders(from, to).await?;
        debug!("{} appointments due for a reminder between {} and {}", due.len(), from, to);

        for appointment in &due {
            match self.coordinator.send_reminder(appointment).await {
                Ok(ReminderOutcome::Dispatched(record)) if record.status == DeliveryStatus::Failed => {
                    report.record_failure(
                        Some(appointment.id),
                        record
                            .error_message
                            .unwrap_or_else(|| "reminder delivery failed".to_string()),
                    );
                }
                Ok(ReminderOutcome::Dispatched(_)) => report.record_success(),
                Ok(ReminderOutcome::AlreadySent) | Ok(ReminderOutcome::NotConfirmed(_)) => report.record_skip(),
                Ok(ReminderOutcome::NoContact) => {
                    report.record_failure(Some(appointment.id), "no contact for requester");
                }
                Err(e) => {
                    warn!("Reminder for {} failed: {}", appointment.id, e);
                    report.record_failure(Some(appointment.id), e);
                }
            }
        }

        Ok(report.finish())
    }

    /// Drops unbooked slots of weeks before the current one.
    #[instrument(skip(self))]
    pub async fn weekly_slot_reset(&self, now: DateTime<Utc>) -> Result<JobReport, MaintenanceError> {
        let mut report = JobReport::start(JobKind::WeeklySlotReset, now);
        let current_week = week_start_of(now.date_naive());

        let removed = self.slots.purge_elapsed(current_week).await?;
        for _ in &removed {
            report.record_success();
        }

        Ok(report.finish())
    }

    #[instrument(skip(self))]
    pub async fn notification_cleanup(&self, now: DateTime<Utc>) -> Result<JobReport, MaintenanceError> {
        let mut report = JobReport::start(JobKind::NotificationCleanup, now);
        let cutoff = now - Duration::days(self.settings.notification_retention_days);

        let removed = self.dispatcher.purge_created_before(cutoff).await?;
        for _ in 0..removed {
            report.record_success();
        }

        Ok(report.finish())
    }

    /// Completes confirmed appointments whose scheduled end has passed.
    #[instrument(skip(self))]
    pub async fn auto_complete(&self, now: DateTime<Utc>) -> Result<JobReport, MaintenanceError> {
        let mut report = JobReport::start(JobKind::AutoComplete, now);

        let ended = self.coordinator.confirmed_ended_before(now).await?;
        for appointment in &ended {
            match self.coordinator.complete(appointment.id).await {
                Ok(_) => report.record_success(),
                Err(e) => {
                    // Typically a cancel or no-show that landed after the listing.
                    warn!("Could not complete {}: {}", appointment.id, e);
                    report.record_failure(Some(appointment.id), e);
                }
            }
        }

        Ok(report.finish())
    }
}
