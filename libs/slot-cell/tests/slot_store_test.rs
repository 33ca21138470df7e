use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime};
use futures::future::join_all;
use uuid::Uuid;

use slot_cell::models::{CreateSlotRequest, SlotError, SlotPattern, TimeWindow, UpdateSlotRequest};
use slot_cell::services::{InMemorySlotRepository, SlotStore};

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn week() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn store() -> SlotStore {
    SlotStore::new(Arc::new(InMemorySlotRepository::new()))
}

fn request(provider_id: Uuid, day: i32, start: NaiveTime, end: NaiveTime) -> CreateSlotRequest {
    CreateSlotRequest {
        provider_id,
        day_of_week: day,
        start_time: start,
        end_time: end,
        week_start_date: week(),
    }
}

#[tokio::test]
async fn test_create_slot_rejects_overlap_but_allows_touching() {
    let store = store();
    let provider = Uuid::new_v4();

    store.create_slot(request(provider, 0, time(9, 0), time(9, 30))).await.unwrap();

    let overlapping = store.create_slot(request(provider, 0, time(9, 15), time(9, 45))).await;
    assert_matches!(overlapping, Err(SlotError::Conflict(_)));

    let touching = store.create_slot(request(provider, 0, time(9, 30), time(10, 0))).await;
    assert!(touching.is_ok());

    let other_provider = store.create_slot(request(Uuid::new_v4(), 0, time(9, 15), time(9, 45))).await;
    assert!(other_provider.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_overlapping_creates_store_one_slot() {
    let store = store();
    let provider = Uuid::new_v4();

    let attempts = (0..8).map(|i| {
        let store = store.clone();
        // Every window covers 09:20-09:30.
        let start = time(9, i * 2);
        tokio::spawn(async move { store.create_slot(request(provider, 0, start, time(9, 30))).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert_matches!(result, Err(SlotError::Conflict(_)));
    }
    assert_eq!(store.slots_for_week(provider, week(), Some(0)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_slot_validates_placement() {
    let store = store();
    let provider = Uuid::new_v4();

    let inverted = store.create_slot(request(provider, 0, time(10, 0), time(9, 0))).await;
    assert_matches!(inverted, Err(SlotError::ValidationError(_)));

    let bad_day = store.create_slot(request(provider, 7, time(9, 0), time(10, 0))).await;
    assert_matches!(bad_day, Err(SlotError::ValidationError(_)));

    let mut tuesday = request(provider, 0, time(9, 0), time(10, 0));
    tuesday.week_start_date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    assert_matches!(store.create_slot(tuesday).await, Err(SlotError::ValidationError(_)));
}

#[tokio::test]
async fn test_update_excludes_own_range_and_rejects_booked() {
    let store = store();
    let provider = Uuid::new_v4();
    let slot = store.create_slot(request(provider, 0, time(9, 0), time(9, 30))).await.unwrap();
    store.create_slot(request(provider, 0, time(10, 0), time(10, 30))).await.unwrap();

    let shifted = store
        .update_slot(slot.id, UpdateSlotRequest {
            start_time: Some(time(9, 10)),
            end_time: Some(time(9, 40)),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(shifted.start_time, time(9, 10));

    let clash = store
        .update_slot(slot.id, UpdateSlotRequest {
            end_time: Some(time(10, 15)),
            ..Default::default()
        })
        .await;
    assert_matches!(clash, Err(SlotError::Conflict(_)));

    assert!(store.mark_booked(slot.id).await.unwrap());
    let booked = store
        .update_slot(slot.id, UpdateSlotRequest {
            day_of_week: Some(2),
            ..Default::default()
        })
        .await;
    assert_matches!(booked, Err(SlotError::InvalidState(_)));
}

#[tokio::test]
async fn test_delete_only_unbooked_slots() {
    let store = store();
    let provider = Uuid::new_v4();
    let slot = store.create_slot(request(provider, 0, time(9, 0), time(9, 30))).await.unwrap();

    assert!(store.mark_booked(slot.id).await.unwrap());
    assert_matches!(store.delete_slot(slot.id).await, Err(SlotError::InvalidState(_)));

    assert!(store.mark_available(slot.id).await.unwrap());
    store.delete_slot(slot.id).await.unwrap();
    assert_matches!(store.get_slot(slot.id).await, Err(SlotError::NotFound));
    assert_matches!(store.delete_slot(slot.id).await, Err(SlotError::NotFound));
}

#[tokio::test]
async fn test_booked_flag_is_compare_and_swap() {
    let store = store();
    let slot = store
        .create_slot(request(Uuid::new_v4(), 0, time(9, 0), time(9, 30)))
        .await
        .unwrap();

    assert!(store.mark_booked(slot.id).await.unwrap());
    assert!(!store.mark_booked(slot.id).await.unwrap());
    assert!(store.get_slot(slot.id).await.unwrap().is_booked);

    assert!(store.available_slots(None, Some(week())).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_bulk_create_skips_existing_conflicts() {
    let store = store();
    let provider = Uuid::new_v4();
    store.create_slot(request(provider, 0, time(9, 20), time(9, 50))).await.unwrap();

    let pattern = SlotPattern {
        week_start_date: week(),
        days_of_week: vec![0, 1, 2, 3, 4],
        start_time: time(9, 0),
        end_time: time(12, 0),
        slot_duration_minutes: 30,
        break_minutes: 10,
        lunch: Some(TimeWindow::new(time(11, 0), time(11, 30))),
        exclude_windows: vec![],
    };

    let result = store.bulk_create(provider, &pattern).await.unwrap();

    // Monday loses 09:00 and 09:40 to the pre-existing 09:20 slot.
    assert_eq!(result.created.len(), 13);
    assert_eq!(result.skipped, 2);

    let lunch = pattern.lunch.unwrap();
    let all = store.slots_for_week(provider, week(), None).await.unwrap();
    for slot in &all {
        assert!(!slot.window().overlaps(&lunch));
        for other in all.iter().filter(|o| o.id != slot.id && o.day_of_week == slot.day_of_week) {
            assert!(!slot.window().overlaps(&other.window()));
        }
    }
}

#[tokio::test]
async fn test_purge_elapsed_keeps_booked_and_current_weeks() {
    let store = store();
    let provider = Uuid::new_v4();
    let old_week = week();
    let current_week = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();

    let stale = store.create_slot(request(provider, 0, time(9, 0), time(9, 30))).await.unwrap();
    let booked = store.create_slot(request(provider, 1, time(9, 0), time(9, 30))).await.unwrap();
    store.mark_booked(booked.id).await.unwrap();
    let current = store
        .create_slot(CreateSlotRequest {
            week_start_date: current_week,
            ..request(provider, 0, time(9, 0), time(9, 30))
        })
        .await
        .unwrap();

    let removed = store.purge_elapsed(current_week).await.unwrap();

    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].id, stale.id);
    assert!(store.get_slot(booked.id).await.is_ok());
    assert!(store.get_slot(current.id).await.is_ok());
    assert_eq!(old_week, booked.week_start_date);
}
