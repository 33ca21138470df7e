use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use futures::future::join_all;
use uuid::Uuid;

use appointment_cell::models::{
    AppointmentError, AppointmentStatus, BookAppointmentRequest, CancelledBy, MeetingMode,
    UpdateAppointmentRequest, MAX_NOTES_LENGTH,
};
use appointment_cell::services::{
    BookingCoordinator, InMemoryAppointmentRepository, LifecycleNotifier, ReminderOutcome,
};
use notification_cell::models::{NotificationKind, NotificationRecord};
use notification_cell::services::{
    InMemoryContactDirectory, InMemoryNotificationRepository, NotificationDispatcher, TracingTransport,
};
use slot_cell::models::{CreateSlotRequest, Slot, SlotError};
use slot_cell::services::{InMemorySlotRepository, SlotRepository, SlotStore};

struct Harness {
    coordinator: Arc<BookingCoordinator>,
    slots: SlotStore,
    dispatcher: NotificationDispatcher,
    contacts: Arc<InMemoryContactDirectory>,
}

fn harness() -> Harness {
    harness_with(Arc::new(InMemorySlotRepository::new()))
}

fn harness_with(slot_repository: Arc<dyn SlotRepository>) -> Harness {
    let slots = SlotStore::new(slot_repository);
    let dispatcher = NotificationDispatcher::new(
        Arc::new(InMemoryNotificationRepository::new()),
        Arc::new(TracingTransport),
    );
    let contacts = Arc::new(InMemoryContactDirectory::new());
    let notifier = LifecycleNotifier::new(dispatcher.clone(), contacts.clone());
    let coordinator = BookingCoordinator::new(
        slots.clone(),
        Arc::new(InMemoryAppointmentRepository::new()),
        notifier,
    );

    Harness {
        coordinator: Arc::new(coordinator),
        slots,
        dispatcher,
        contacts,
    }
}

/// Slot storage whose "clear booked flag" call can be made to fail.
#[derive(Default)]
struct ReleaseFailingSlots {
    inner: InMemorySlotRepository,
    fail_release: AtomicBool,
}

#[async_trait]
impl SlotRepository for ReleaseFailingSlots {
    async fn insert(&self, slot: Slot) -> Result<Slot, SlotError> {
        self.inner.insert(slot).await
    }

    async fn get(&self, slot_id: Uuid) -> Result<Option<Slot>, SlotError> {
        self.inner.get(slot_id).await
    }

    async fn list_for_week(
        &self,
        provider_id: Uuid,
        week_start_date: NaiveDate,
        day_of_week: Option<i32>,
    ) -> Result<Vec<Slot>, SlotError> {
        self.inner.list_for_week(provider_id, week_start_date, day_of_week).await
    }

    async fn list_unbooked(
        &self,
        provider_id: Option<Uuid>,
        week_start_date: Option<NaiveDate>,
    ) -> Result<Vec<Slot>, SlotError> {
        self.inner.list_unbooked(provider_id, week_start_date).await
    }

    async fn update_unbooked(&self, slot: &Slot) -> Result<Option<Slot>, SlotError> {
        self.inner.update_unbooked(slot).await
    }

    async fn delete_unbooked(&self, slot_id: Uuid) -> Result<bool, SlotError> {
        self.inner.delete_unbooked(slot_id).await
    }

    async fn compare_and_set_booked(&self, slot_id: Uuid, expected: bool, new: bool) -> Result<bool, SlotError> {
        if expected && !new && self.fail_release.load(Ordering::SeqCst) {
            return Err(SlotError::DatabaseError("connection reset".to_string()));
        }
        self.inner.compare_and_set_booked(slot_id, expected, new).await
    }

    async fn delete_unbooked_before(&self, week_start_date: NaiveDate) -> Result<Vec<Slot>, SlotError> {
        self.inner.delete_unbooked_before(week_start_date).await
    }
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

async fn morning_slot(slots: &SlotStore, provider_id: Uuid) -> Slot {
    slots
        .create_slot(CreateSlotRequest {
            provider_id,
            day_of_week: 0,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            week_start_date: monday(),
        })
        .await
        .unwrap()
}

fn online(slot_id: Uuid) -> BookAppointmentRequest {
    BookAppointmentRequest {
        slot_id,
        meeting_mode: MeetingMode::Online,
        notes: None,
        requester_id: None,
    }
}

/// Background notifications land shortly after the call that triggers them.
async fn wait_for_notifications(
    dispatcher: &NotificationDispatcher,
    appointment_id: Uuid,
    expected: usize,
) -> Vec<NotificationRecord> {
    for _ in 0..100 {
        let records = dispatcher.get_by_appointment(appointment_id).await.unwrap();
        if records.len() >= expected {
            return records;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    dispatcher.get_by_appointment(appointment_id).await.unwrap()
}

#[tokio::test]
async fn test_book_confirm_cancel_and_rebook() {
    let h = harness();
    let provider = Uuid::new_v4();
    let first_requester = Uuid::new_v4();
    let second_requester = Uuid::new_v4();
    let slot = morning_slot(&h.slots, provider).await;

    let appointment = h.coordinator.book(first_requester, online(slot.id)).await.unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert_eq!(appointment.provider_id, provider);
    assert_eq!(appointment.scheduled_start, slot.starts_at());
    assert!(h.slots.get_slot(slot.id).await.unwrap().is_booked);

    let err = h.coordinator.book(second_requester, online(slot.id)).await.unwrap_err();
    assert_matches!(err, AppointmentError::SlotAlreadyBooked);

    let confirmed = h.coordinator.confirm(appointment.id).await.unwrap();
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);

    let cancelled = h.coordinator.cancel(appointment.id, CancelledBy::Requester).await.unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.cancelled_by, Some(CancelledBy::Requester));
    assert!(!h.slots.get_slot(slot.id).await.unwrap().is_booked);

    let rebooked = h.coordinator.book(second_requester, online(slot.id)).await.unwrap();
    assert_eq!(rebooked.requester_id, second_requester);
    assert_ne!(rebooked.id, appointment.id);
    assert!(h.slots.get_slot(slot.id).await.unwrap().is_booked);
}

#[tokio::test]
async fn test_concurrent_bookings_yield_exactly_one_winner() {
    let h = harness();
    let slot = morning_slot(&h.slots, Uuid::new_v4()).await;

    let attempts = (0..16).map(|_| {
        let coordinator = h.coordinator.clone();
        let request = online(slot.id);
        tokio::spawn(async move { coordinator.book(Uuid::new_v4(), request).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert_matches!(result, Err(AppointmentError::SlotAlreadyBooked));
    }

    let held = h
        .coordinator
        .list_by_status(AppointmentStatus::Pending)
        .await
        .unwrap();
    assert_eq!(held.len(), 1);
}

#[tokio::test]
async fn test_failed_slot_release_surfaces_and_stale_flag_is_repaired() {
    let repository = Arc::new(ReleaseFailingSlots::default());
    let h = harness_with(repository.clone());
    let slot = morning_slot(&h.slots, Uuid::new_v4()).await;
    let appointment = h.coordinator.book(Uuid::new_v4(), online(slot.id)).await.unwrap();

    repository.fail_release.store(true, Ordering::SeqCst);
    let err = h
        .coordinator
        .cancel(appointment.id, CancelledBy::Requester)
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::DatabaseError(_));
    assert_eq!(
        h.coordinator.get(appointment.id).await.unwrap().status,
        AppointmentStatus::Cancelled
    );
    assert!(h.slots.get_slot(slot.id).await.unwrap().is_booked);

    repository.fail_release.store(false, Ordering::SeqCst);
    let second_requester = Uuid::new_v4();
    let rebooked = h.coordinator.book(second_requester, online(slot.id)).await.unwrap();
    assert_eq!(rebooked.requester_id, second_requester);
    assert!(h.slots.get_slot(slot.id).await.unwrap().is_booked);

    let err = h.coordinator.book(Uuid::new_v4(), online(slot.id)).await.unwrap_err();
    assert_matches!(err, AppointmentError::SlotAlreadyBooked);
}

#[tokio::test]
async fn test_concurrent_cancel_and_complete_have_one_winner() {
    for _ in 0..8 {
        let h = harness();
        let slot = morning_slot(&h.slots, Uuid::new_v4()).await;
        let appointment = h.coordinator.book(Uuid::new_v4(), online(slot.id)).await.unwrap();
        h.coordinator.confirm(appointment.id).await.unwrap();

        let cancel = {
            let coordinator = h.coordinator.clone();
            tokio::spawn(async move { coordinator.cancel(appointment.id, CancelledBy::Provider).await })
        };
        let complete = {
            let coordinator = h.coordinator.clone();
            tokio::spawn(async move { coordinator.complete(appointment.id).await })
        };
        let results: Vec<_> = join_all([cancel, complete])
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let loser = results.iter().find(|r| r.is_err()).unwrap();
        assert_matches!(loser, Err(AppointmentError::InvalidStatusTransition { .. }));

        let stored = h.coordinator.get(appointment.id).await.unwrap();
        let booked = h.slots.get_slot(slot.id).await.unwrap().is_booked;
        match stored.status {
            AppointmentStatus::Cancelled => assert!(!booked),
            AppointmentStatus::Completed => assert!(booked),
            other => panic!("unexpected status {}", other),
        }
    }
}

#[tokio::test]
async fn test_booking_unknown_slot_is_not_found() {
    let h = harness();

    let err = h.coordinator.book(Uuid::new_v4(), online(Uuid::new_v4())).await.unwrap_err();
    assert_matches!(err, AppointmentError::SlotNotFound);
}

#[tokio::test]
async fn test_oversized_notes_are_rejected_before_booking() {
    let h = harness();
    let slot = morning_slot(&h.slots, Uuid::new_v4()).await;

    let mut request = online(slot.id);
    request.notes = Some("x".repeat(MAX_NOTES_LENGTH + 1));

    let err = h.coordinator.book(Uuid::new_v4(), request).await.unwrap_err();
    assert_matches!(err, AppointmentError::ValidationError(_));
    assert!(!h.slots.get_slot(slot.id).await.unwrap().is_booked);
}

#[tokio::test]
async fn test_illegal_transition_leaves_status_unchanged() {
    let h = harness();
    let slot = morning_slot(&h.slots, Uuid::new_v4()).await;
    let appointment = h.coordinator.book(Uuid::new_v4(), online(slot.id)).await.unwrap();

    h.coordinator.confirm(appointment.id).await.unwrap();

    let err = h.coordinator.confirm(appointment.id).await.unwrap_err();
    assert_matches!(
        err,
        AppointmentError::InvalidStatusTransition {
            from: AppointmentStatus::Confirmed,
            to: AppointmentStatus::Confirmed,
        }
    );
    let stored = h.coordinator.get(appointment.id).await.unwrap();
    assert_eq!(stored.status, AppointmentStatus::Confirmed);
}

#[tokio::test]
async fn test_terminal_appointments_reject_further_changes() {
    let h = harness();
    let slot = morning_slot(&h.slots, Uuid::new_v4()).await;
    let appointment = h.coordinator.book(Uuid::new_v4(), online(slot.id)).await.unwrap();
    h.coordinator.confirm(appointment.id).await.unwrap();
    h.coordinator.complete(appointment.id).await.unwrap();

    let err = h.coordinator.cancel(appointment.id, CancelledBy::Provider).await.unwrap_err();
    assert_matches!(err, AppointmentError::InvalidStatusTransition { .. });

    let err = h
        .coordinator
        .update_details(
            appointment.id,
            UpdateAppointmentRequest {
                notes: Some("bring documents".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::NotModifiable(AppointmentStatus::Completed));

    // Completing does not free the slot.
    assert!(h.slots.get_slot(slot.id).await.unwrap().is_booked);
}

#[tokio::test]
async fn test_update_details_changes_mode_and_notes() {
    let h = harness();
    let slot = morning_slot(&h.slots, Uuid::new_v4()).await;
    let appointment = h.coordinator.book(Uuid::new_v4(), online(slot.id)).await.unwrap();

    let updated = h
        .coordinator
        .update_details(
            appointment.id,
            UpdateAppointmentRequest {
                meeting_mode: Some(MeetingMode::FaceToFace),
                notes: Some("ground floor".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.meeting_mode, MeetingMode::FaceToFace);
    assert_eq!(updated.notes.as_deref(), Some("ground floor"));
    assert_eq!(updated.status, AppointmentStatus::Pending);

    let err = h
        .coordinator
        .update_details(
            appointment.id,
            UpdateAppointmentRequest {
                notes: Some("y".repeat(MAX_NOTES_LENGTH + 1)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, AppointmentError::ValidationError(_));
}

#[tokio::test]
async fn test_no_show_keeps_slot_booked() {
    let h = harness();
    let slot = morning_slot(&h.slots, Uuid::new_v4()).await;
    let appointment = h.coordinator.book(Uuid::new_v4(), online(slot.id)).await.unwrap();
    h.coordinator.confirm(appointment.id).await.unwrap();

    let missed = h.coordinator.mark_no_show(appointment.id).await.unwrap();
    assert_eq!(missed.status, AppointmentStatus::NoShow);
    assert!(h.slots.get_slot(slot.id).await.unwrap().is_booked);
}

#[tokio::test]
async fn test_summaries_count_by_status() {
    let h = harness();
    let provider = Uuid::new_v4();
    let requester = Uuid::new_v4();

    let first = morning_slot(&h.slots, provider).await;
    let second = h
        .slots
        .create_slot(CreateSlotRequest {
            provider_id: provider,
            day_of_week: 1,
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            week_start_date: monday(),
        })
        .await
        .unwrap();

    let kept = h.coordinator.book(requester, online(first.id)).await.unwrap();
    let dropped = h.coordinator.book(requester, online(second.id)).await.unwrap();
    h.coordinator.confirm(kept.id).await.unwrap();
    h.coordinator.cancel(dropped.id, CancelledBy::Requester).await.unwrap();

    let summary = h.coordinator.requester_summary(requester).await.unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.confirmed, 1);
    assert_eq!(summary.cancelled, 1);

    let confirmed_only = h
        .coordinator
        .list_for_provider(provider, Some(AppointmentStatus::Confirmed))
        .await
        .unwrap();
    assert_eq!(confirmed_only.len(), 1);
    assert_eq!(confirmed_only[0].id, kept.id);
}

#[tokio::test]
async fn test_booking_and_cancellation_notify_both_parties() {
    let h = harness();
    let provider = Uuid::new_v4();
    let requester = Uuid::new_v4();
    h.contacts.insert(provider, "grace@example.com", "Grace").await;
    h.contacts.insert(requester, "ada@example.com", "Ada").await;
    let slot = morning_slot(&h.slots, provider).await;

    let appointment = h.coordinator.book(requester, online(slot.id)).await.unwrap();
    let records = wait_for_notifications(&h.dispatcher, appointment.id, 2).await;
    assert_eq!(records.len(), 2);
    assert!(records.iter().any(|r| {
        r.notification_type == NotificationKind::AppointmentConfirmation
            && r.recipient_email == "ada@example.com"
    }));
    assert!(records.iter().any(|r| {
        r.notification_type == NotificationKind::ProviderAlert
            && r.recipient_email == "grace@example.com"
    }));

    h.coordinator.cancel(appointment.id, CancelledBy::Provider).await.unwrap();
    let records = wait_for_notifications(&h.dispatcher, appointment.id, 4).await;
    let cancellations = records
        .iter()
        .filter(|r| r.notification_type == NotificationKind::AppointmentCancellation)
        .count();
    assert_eq!(cancellations, 2);
}

#[tokio::test]
async fn test_reminder_is_claimed_once() {
    let h = harness();
    let provider = Uuid::new_v4();
    let requester = Uuid::new_v4();
    h.contacts.insert(requester, "ada@example.com", "Ada").await;
    let slot = morning_slot(&h.slots, provider).await;

    let appointment = h.coordinator.book(requester, online(slot.id)).await.unwrap();
    let confirmed = h.coordinator.confirm(appointment.id).await.unwrap();

    let first = h.coordinator.send_reminder(&confirmed).await.unwrap();
    assert_matches!(first, ReminderOutcome::Dispatched(ref record) => {
        assert_eq!(record.notification_type, NotificationKind::AppointmentReminder);
    });

    let second = h.coordinator.send_reminder(&confirmed).await.unwrap();
    assert_matches!(second, ReminderOutcome::AlreadySent);
    assert!(h.coordinator.get(appointment.id).await.unwrap().reminder_sent);
}

#[tokio::test]
async fn test_no_reminder_for_appointment_cancelled_after_listing() {
    let h = harness();
    let requester = Uuid::new_v4();
    h.contacts.insert(requester, "ada@example.com", "Ada").await;
    let slot = morning_slot(&h.slots, Uuid::new_v4()).await;

    let appointment = h.coordinator.book(requester, online(slot.id)).await.unwrap();
    let listed = h.coordinator.confirm(appointment.id).await.unwrap();
    h.coordinator.cancel(appointment.id, CancelledBy::Requester).await.unwrap();

    let outcome = h.coordinator.send_reminder(&listed).await.unwrap();
    assert_matches!(outcome, ReminderOutcome::NotConfirmed(AppointmentStatus::Cancelled));
    assert!(!h.coordinator.get(appointment.id).await.unwrap().reminder_sent);

    let records = wait_for_notifications(&h.dispatcher, appointment.id, 2).await;
    assert!(records
        .iter()
        .all(|r| r.notification_type != NotificationKind::AppointmentReminder));
}

#[tokio::test]
async fn test_reminder_without_contact_still_claims_flag() {
    let h = harness();
    let slot = morning_slot(&h.slots, Uuid::new_v4()).await;
    let appointment = h.coordinator.book(Uuid::new_v4(), online(slot.id)).await.unwrap();
    let confirmed = h.coordinator.confirm(appointment.id).await.unwrap();

    let outcome = h.coordinator.send_reminder(&confirmed).await.unwrap();
    assert_matches!(outcome, ReminderOutcome::NoContact);
    assert!(h.coordinator.get(appointment.id).await.unwrap().reminder_sent);
}

#[tokio::test]
async fn test_due_reminders_cover_confirmed_window_only() {
    let h = harness();
    let slot = morning_slot(&h.slots, Uuid::new_v4()).await;
    let appointment = h.coordinator.book(Uuid::new_v4(), online(slot.id)).await.unwrap();

    let from = slot.starts_at() - chrono::Duration::hours(25);
    let to = slot.starts_at() - chrono::Duration::hours(23);
    assert!(h.coordinator.due_reminders(from, to).await.unwrap().is_empty());

    let from = slot.starts_at() - chrono::Duration::hours(1);
    let to = slot.starts_at() + chrono::Duration::hours(1);
    assert!(h.coordinator.due_reminders(from, to).await.unwrap().is_empty());

    h.coordinator.confirm(appointment.id).await.unwrap();
    let due = h.coordinator.due_reminders(from, to).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, appointment.id);
}
