// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use notification_cell::models::NotificationRecord;
use shared_utils::locks::KeyedLocks;
use slot_cell::services::SlotStore;

use crate::models::{
    validate_notes, Appointment, AppointmentError, AppointmentStatus, AppointmentSummary,
    BookAppointmentRequest, CancelledBy, UpdateAppointmentRequest,
};
use crate::services::lifecycle::AppointmentStateMachine;
use crate::services::notifier::LifecycleNotifier;
use crate::services::repository::AppointmentRepository;

#[derive(Debug, Clone)]
pub enum ReminderOutcome {
    Dispatched(NotificationRecord),
    /// Another run claimed the flag first.
    AlreadySent,
    /// Cancelled, completed or otherwise moved on since it was listed.
    NotConfirmed(AppointmentStatus),
    /// Flag claimed but the requester has no known address.
    NoContact,
}

/// Owns every mutation of appointments and of the slot booked flag.
///
/// Booking holds the slot's in-process lock and flips the flag with a
/// storage-level compare-and-swap, so at most one active appointment can
/// exist per slot even when several processes share the database.
/// Transitions hold the appointment's lock and apply a status CAS.
pub struct BookingCoordinator {
    slots: SlotStore,
    appointments: Arc<dyn AppointmentRepository>,
    notifier: LifecycleNotifier,
    state_machine: AppointmentStateMachine,
    slot_locks: KeyedLocks,
    appointment_locks: KeyedLocks,
}

impl BookingCoordinator {
    pub fn new(
        slots: SlotStore,
        appointments: Arc<dyn AppointmentRepository>,
        notifier: LifecycleNotifier,
    ) -> Self {
        Self {
            slots,
            appointments,
            notifier,
            state_machine: AppointmentStateMachine::new(),
            slot_locks: KeyedLocks::new(),
            appointment_locks: KeyedLocks::new(),
        }
    }

    pub fn state_machine(&self) -> &AppointmentStateMachine {
        &self.state_machine
    }

    pub fn notifier(&self) -> &LifecycleNotifier {
        &self.notifier
    }

    // ==========================================================================
    // BOOKING
    // ==========================================================================

    #[instrument(skip(self, request), fields(slot_id = %request.slot_id))]
    pub async fn book(
        &self,
        requester_id: Uuid,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        validate_notes(request.notes.as_deref())?;

        // Existence check before taking a lock for an id that may not exist.
        self.slots.get_slot(request.slot_id).await?;

        let appointment = {
            let _guard = self.slot_locks.lock(request.slot_id).await;

            let slot = self.slots.get_slot(request.slot_id).await?;
            if let Some(existing) = self.appointments.find_active_for_slot(slot.id).await? {
                debug!("Slot {} held by appointment {}", slot.id, existing.id);
                return Err(AppointmentError::SlotAlreadyBooked);
            }
            if slot.is_booked {
                // Left behind by a cancellation or rollback whose release failed.
                warn!("Slot {} flagged as booked without an active appointment, clearing", slot.id);
                self.slots.mark_available(slot.id).await?;
            }

            if !self.slots.mark_booked(slot.id).await? {
                debug!("Booked flag CAS lost on slot {}", slot.id);
                return Err(AppointmentError::SlotAlreadyBooked);
            }

            let candidate = Appointment::for_slot(&slot, requester_id, request.meeting_mode, request.notes);
            match self.appointments.insert(candidate).await {
                Ok(created) => created,
                // Another writer holds the slot; the flag is theirs now.
                Err(AppointmentError::SlotAlreadyBooked) => return Err(AppointmentError::SlotAlreadyBooked),
                Err(e) => {
                    if let Err(release) = self.release_slot(slot.id).await {
                        error!("Rollback of slot {} failed: {}", slot.id, release);
                    }
                    return Err(e);
                }
            }
        };

        info!("Booked appointment {} on slot {}", appointment.id, appointment.slot_id);
        self.notifier.booked(&appointment);

        Ok(appointment)
    }

    async fn release_slot(&self, slot_id: Uuid) -> Result<(), AppointmentError> {
        match self.slots.mark_available(slot_id).await {
            Ok(true) => {
                debug!("Released slot {}", slot_id);
                Ok(())
            }
            Ok(false) => {
                warn!("Slot {} was already available", slot_id);
                Ok(())
            }
            Err(e) => {
                error!("Failed to release slot {}: {}", slot_id, e);
                Err(AppointmentError::DatabaseError(format!(
                    "slot {} was not released: {}",
                    slot_id, e
                )))
            }
        }
    }

    // ==========================================================================
    // TRANSITIONS
    // ==========================================================================

    pub async fn confirm(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.transition(appointment_id, AppointmentStatus::Confirmed, None).await
    }

    pub async fn complete(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.transition(appointment_id, AppointmentStatus::Completed, None).await
    }

    pub async fn mark_no_show(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.transition(appointment_id, AppointmentStatus::NoShow, None).await
    }

    /// Cancels the appointment and frees its slot for immediate rebooking.
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        cancelled_by: CancelledBy,
    ) -> Result<Appointment, AppointmentError> {
        let cancelled = self
            .transition(appointment_id, AppointmentStatus::Cancelled, Some(cancelled_by))
            .await?;

        self.notifier.cancelled(&cancelled, cancelled_by);
        Ok(cancelled)
    }

    #[instrument(skip(self))]
    async fn transition(
        &self,
        appointment_id: Uuid,
        target: AppointmentStatus,
        cancelled_by: Option<CancelledBy>,
    ) -> Result<Appointment, AppointmentError> {
        let _guard = self.appointment_locks.lock(appointment_id).await;

        let current = self.get(appointment_id).await?;
        self.state_machine
            .validate_status_transition(current.status, target)?;

        // Cancelling touches the slot flag, so it also excludes bookings of that slot.
        let _slot_guard = if target == AppointmentStatus::Cancelled {
            Some(self.slot_locks.lock(current.slot_id).await)
        } else {
            None
        };

        let updated = self
            .appointments
            .update_status(appointment_id, current.status, target, cancelled_by)
            .await?
            .ok_or(AppointmentError::InvalidStatusTransition {
                from: current.status,
                to: target,
            })?;

        if target == AppointmentStatus::Cancelled {
            self.release_slot(updated.slot_id).await?;
        }

        info!("Appointment {} moved {} -> {}", appointment_id, current.status, target);
        Ok(updated)
    }

    #[instrument(skip(self, changes))]
    pub async fn update_details(
        &self,
        appointment_id: Uuid,
        changes: UpdateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        validate_notes(changes.notes.as_deref())?;

        let _guard = self.appointment_locks.lock(appointment_id).await;

        let current = self.get(appointment_id).await?;
        if !self.state_machine.can_modify(current.status) {
            return Err(AppointmentError::NotModifiable(current.status));
        }

        self.appointments
            .update_details(appointment_id, &changes)
            .await?
            .ok_or(AppointmentError::NotModifiable(current.status))
    }

    // ==========================================================================
    // QUERIES
    // ==========================================================================

    pub async fn get(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.appointments
            .get(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    pub async fn list_for_requester(
        &self,
        requester_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.appointments.list_by_requester(requester_id, status).await
    }

    pub async fn list_for_provider(
        &self,
        provider_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.appointments.list_by_provider(provider_id, status).await
    }

    pub async fn list_by_status(&self, status: AppointmentStatus) -> Result<Vec<Appointment>, AppointmentError> {
        self.appointments.list_by_status(status).await
    }

    pub async fn requester_summary(&self, requester_id: Uuid) -> Result<AppointmentSummary, AppointmentError> {
        let appointments = self.list_for_requester(requester_id, None).await?;
        Ok(AppointmentSummary::from_appointments(&appointments))
    }

    pub async fn provider_summary(&self, provider_id: Uuid) -> Result<AppointmentSummary, AppointmentError> {
        let appointments = self.list_for_provider(provider_id, None).await?;
        Ok(AppointmentSummary::from_appointments(&appointments))
    }

    // ==========================================================================
    // SCHEDULED WORK
    // ==========================================================================

    pub async fn due_reminders(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.appointments.list_due_reminders(from, to).await
    }

    pub async fn confirmed_ended_before(&self, now: DateTime<Utc>) -> Result<Vec<Appointment>, AppointmentError> {
        self.appointments.list_confirmed_ended_before(now).await
    }

    /// Claims the reminder flag and sends the reminder.
    ///
    /// The flag is set before delivery, so a failed delivery is retried
    /// through the notification log rather than by a second scan. The
    /// appointment is re-read under its lock; one that stopped being
    /// confirmed since it was listed gets no reminder.
    #[instrument(skip(self, appointment), fields(appointment_id = %appointment.id))]
    pub async fn send_reminder(&self, appointment: &Appointment) -> Result<ReminderOutcome, AppointmentError> {
        let current = {
            let _guard = self.appointment_locks.lock(appointment.id).await;

            let current = self.get(appointment.id).await?;
            if current.status != AppointmentStatus::Confirmed {
                debug!("Appointment {} is {}, no reminder", current.id, current.status);
                return Ok(ReminderOutcome::NotConfirmed(current.status));
            }
            if !self.appointments.mark_reminder_sent(current.id).await? {
                debug!("Reminder for {} already claimed", current.id);
                return Ok(ReminderOutcome::AlreadySent);
            }
            current
        };

        let record = self
            .notifier
            .reminder(&current)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(match record {
            Some(record) => ReminderOutcome::Dispatched(record),
            None => ReminderOutcome::NoContact,
        })
    }
}
