use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{Slot, TimeWindow};

/// Overlap checks for a provider's slots on one day of one week.
pub struct ConflictDetector;

impl ConflictDetector {
    /// `[s1, e1)` and `[s2, e2)` overlap iff `s1 < e2 && e1 > s2`.
    pub fn overlaps(a: &TimeWindow, b: &TimeWindow) -> bool {
        a.overlaps(b)
    }

    /// Slots in `existing` that block `candidate` for the given provider, week and day.
    pub fn find_conflicts<'a>(
        existing: &'a [Slot],
        provider_id: Uuid,
        week_start_date: NaiveDate,
        day_of_week: i32,
        candidate: &TimeWindow,
        exclude_slot_id: Option<Uuid>,
    ) -> Vec<&'a Slot> {
        existing
            .iter()
            .filter(|slot| slot.provider_id == provider_id)
            .filter(|slot| slot.week_start_date == week_start_date)
            .filter(|slot| slot.day_of_week == day_of_week)
            .filter(|slot| Some(slot.id) != exclude_slot_id)
            .filter(|slot| slot.window().overlaps(candidate))
            .collect()
    }

    pub fn has_conflict(
        existing: &[Slot],
        provider_id: Uuid,
        week_start_date: NaiveDate,
        day_of_week: i32,
        candidate: &TimeWindow,
        exclude_slot_id: Option<Uuid>,
    ) -> bool {
        !Self::find_conflicts(
            existing,
            provider_id,
            week_start_date,
            day_of_week,
            candidate,
            exclude_slot_id,
        )
        .is_empty()
    }
}
