use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_utils::locks::KeyedLocks;

use crate::models::{
    is_monday, BulkCreateResult, CreateSlotRequest, Slot, SlotError, SlotPattern, TimeWindow,
    UpdateSlotRequest,
};
use crate::services::conflict::ConflictDetector;
use crate::services::pattern::generate_candidates;
use crate::services::repository::SlotRepository;

/// Slot creation, lookup and booked-flag control on top of a repository.
///
/// Writes that run the overlap check hold a lock per (provider, week), so
/// two overlapping requests in this process cannot both pass the check.
#[derive(Clone)]
pub struct SlotStore {
    repository: Arc<dyn SlotRepository>,
    week_locks: Arc<KeyedLocks<(Uuid, NaiveDate)>>,
}

impl SlotStore {
    pub fn new(repository: Arc<dyn SlotRepository>) -> Self {
        Self {
            repository,
            week_locks: Arc::new(KeyedLocks::new()),
        }
    }

    #[instrument(skip(self, request), fields(provider_id = %request.provider_id))]
    pub async fn create_slot(&self, request: CreateSlotRequest) -> Result<Slot, SlotError> {
        let window = TimeWindow::new(request.start_time, request.end_time);
        validate_placement(request.day_of_week, &window, request.week_start_date)?;

        let _guard = self
            .week_locks
            .lock((request.provider_id, request.week_start_date))
            .await;
        let existing = self
            .repository
            .list_for_week(request.provider_id, request.week_start_date, Some(request.day_of_week))
            .await?;

        let conflicts = ConflictDetector::find_conflicts(
            &existing,
            request.provider_id,
            request.week_start_date,
            request.day_of_week,
            &window,
            None,
        );
        if let Some(blocking) = conflicts.first() {
            warn!("Slot request overlaps slot {}", blocking.id);
            return Err(SlotError::Conflict(format!(
                "overlaps slot {} ({}-{})",
                blocking.id, blocking.start_time, blocking.end_time
            )));
        }

        let slot = Slot::new(
            request.provider_id,
            request.week_start_date,
            request.day_of_week,
            window,
        );
        let created = self.repository.insert(slot).await?;

        info!("Created slot {} on day {}", created.id, created.day_of_week);
        Ok(created)
    }

    /// Best-effort generation: candidates that conflict are skipped, not fatal.
    #[instrument(skip(self, pattern))]
    pub async fn bulk_create(
        &self,
        provider_id: Uuid,
        pattern: &SlotPattern,
    ) -> Result<BulkCreateResult, SlotError> {
        let candidates = generate_candidates(pattern)?;

        let _guard = self.week_locks.lock((provider_id, pattern.week_start_date)).await;
        let mut existing = self
            .repository
            .list_for_week(provider_id, pattern.week_start_date, None)
            .await?;

        let mut created = Vec::new();
        let mut skipped = 0;

        for (day, window) in candidates {
            if ConflictDetector::has_conflict(
                &existing,
                provider_id,
                pattern.week_start_date,
                day,
                &window,
                None,
            ) {
                debug!("Skipping day {} {}-{}: conflict", day, window.start, window.end);
                skipped += 1;
                continue;
            }

            let slot = Slot::new(provider_id, pattern.week_start_date, day, window);
            let stored = self.repository.insert(slot).await?;
            existing.push(stored.clone());
            created.push(stored);
        }

        info!(
            "Bulk created {} slots for provider {} ({} skipped)",
            created.len(),
            provider_id,
            skipped
        );
        Ok(BulkCreateResult { created, skipped })
    }

    pub async fn get_slot(&self, slot_id: Uuid) -> Result<Slot, SlotError> {
        self.repository
            .get(slot_id)
            .await?
            .ok_or(SlotError::NotFound)
    }

    pub async fn slots_for_week(
        &self,
        provider_id: Uuid,
        week_start_date: NaiveDate,
        day_of_week: Option<i32>,
    ) -> Result<Vec<Slot>, SlotError> {
        self.repository
            .list_for_week(provider_id, week_start_date, day_of_week)
            .await
    }

    pub async fn available_slots(
        &self,
        provider_id: Option<Uuid>,
        week_start_date: Option<NaiveDate>,
    ) -> Result<Vec<Slot>, SlotError> {
        self.repository.list_unbooked(provider_id, week_start_date).await
    }

    #[instrument(skip(self, request))]
    pub async fn update_slot(
        &self,
        slot_id: Uuid,
        request: UpdateSlotRequest,
    ) -> Result<Slot, SlotError> {
        let current = self.get_slot(slot_id).await?;
        if current.is_booked {
            return Err(SlotError::InvalidState("cannot update a booked slot".to_string()));
        }

        let mut proposed = current.clone();
        if let Some(day) = request.day_of_week {
            proposed.day_of_week = day;
        }
        if let Some(start) = request.start_time {
            proposed.start_time = start;
        }
        if let Some(end) = request.end_time {
            proposed.end_time = end;
        }
        if let Some(week) = request.week_start_date {
            proposed.week_start_date = week;
        }

        let window = proposed.window();
        validate_placement(proposed.day_of_week, &window, proposed.week_start_date)?;

        let _guard = self
            .week_locks
            .lock((proposed.provider_id, proposed.week_start_date))
            .await;
        let existing = self
            .repository
            .list_for_week(proposed.provider_id, proposed.week_start_date, Some(proposed.day_of_week))
            .await?;
        if ConflictDetector::has_conflict(
            &existing,
            proposed.provider_id,
            proposed.week_start_date,
            proposed.day_of_week,
            &window,
            Some(slot_id),
        ) {
            return Err(SlotError::Conflict(
                "updated slot overlaps an existing slot".to_string(),
            ));
        }

        let updated = self
            .repository
            .update_unbooked(&proposed)
            .await?
            .ok_or_else(|| SlotError::InvalidState("slot was booked or removed".to_string()))?;

        info!("Updated slot {}", slot_id);
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_slot(&self, slot_id: Uuid) -> Result<(), SlotError> {
        let current = self.get_slot(slot_id).await?;
        if current.is_booked {
            return Err(SlotError::InvalidState("cannot delete a booked slot".to_string()));
        }

        if !self.repository.delete_unbooked(slot_id).await? {
            return Err(SlotError::InvalidState("slot was booked or removed".to_string()));
        }

        info!("Deleted slot {}", slot_id);
        Ok(())
    }

    /// Flips the booked flag false -> true. `false` means someone else holds it.
    pub async fn mark_booked(&self, slot_id: Uuid) -> Result<bool, SlotError> {
        self.repository.compare_and_set_booked(slot_id, false, true).await
    }

    /// Flips the booked flag true -> false. `false` means it was already clear.
    pub async fn mark_available(&self, slot_id: Uuid) -> Result<bool, SlotError> {
        self.repository.compare_and_set_booked(slot_id, true, false).await
    }

    /// Deletes unbooked slots of weeks starting before `current_week_start`.
    #[instrument(skip(self))]
    pub async fn purge_elapsed(&self, current_week_start: NaiveDate) -> Result<Vec<Slot>, SlotError> {
        let removed = self.repository.delete_unbooked_before(current_week_start).await?;
        info!("Purged {} elapsed unbooked slots", removed.len());
        Ok(removed)
    }
}

fn validate_placement(day_of_week: i32, window: &TimeWindow, week_start_date: NaiveDate) -> Result<(), SlotError> {
    if !(0..=6).contains(&day_of_week) {
        return Err(SlotError::ValidationError(format!(
            "day_of_week must be between 0 and 6, got {}",
            day_of_week
        )));
    }
    if window.start >= window.end {
        return Err(SlotError::ValidationError(
            "start_time must be before end_time".to_string(),
        ));
    }
    if !is_monday(week_start_date) {
        return Err(SlotError::ValidationError(
            "week_start_date must be a Monday".to_string(),
        ));
    }
    Ok(())
}
