use chrono::{Duration, NaiveTime};
use tracing::debug;

use crate::models::{is_monday, SlotError, SlotPattern, TimeWindow};

/// Upper bound for slot length and break; nothing longer fits in a day.
const MINUTES_PER_DAY: i64 = 24 * 60;

/// Expands a pattern into `(day_of_week, window)` candidates.
///
/// Each day is walked from the daily start: a candidate `[t, t + duration)`
/// is produced while it ends at or before the daily end, candidates touching
/// the lunch window or an excluded window are dropped, and the cursor moves
/// to `candidate_end + break`. Days outside `0..=6` are ignored.
pub fn generate_candidates(pattern: &SlotPattern) -> Result<Vec<(i32, TimeWindow)>, SlotError> {
    validate_pattern(pattern)?;

    let duration = Duration::minutes(pattern.slot_duration_minutes);
    let pause = Duration::minutes(pattern.break_minutes);
    let day_windows = walk_day(pattern.start_time, pattern.end_time, duration, pause);

    let usable: Vec<TimeWindow> = day_windows
        .into_iter()
        .filter(|window| !pattern.lunch.is_some_and(|lunch| lunch.overlaps(window)))
        .filter(|window| !pattern.exclude_windows.iter().any(|ex| ex.overlaps(window)))
        .collect();

    let mut days: Vec<i32> = pattern
        .days_of_week
        .iter()
        .copied()
        .filter(|day| (0..=6).contains(day))
        .collect();
    days.sort_unstable();
    days.dedup();

    let candidates: Vec<(i32, TimeWindow)> = days
        .into_iter()
        .flat_map(|day| usable.iter().map(move |window| (day, *window)))
        .collect();

    debug!("Pattern expanded into {} candidates", candidates.len());
    Ok(candidates)
}

fn walk_day(day_start: NaiveTime, day_end: NaiveTime, duration: Duration, pause: Duration) -> Vec<TimeWindow> {
    let mut windows = Vec::new();
    let mut cursor = day_start;

    loop {
        let (end, wrapped) = cursor.overflowing_add_signed(duration);
        if wrapped != 0 || end > day_end {
            break;
        }
        windows.push(TimeWindow::new(cursor, end));

        let (next, wrapped) = end.overflowing_add_signed(pause);
        if wrapped != 0 {
            break;
        }
        cursor = next;
    }

    windows
}

fn validate_pattern(pattern: &SlotPattern) -> Result<(), SlotError> {
    if !is_monday(pattern.week_start_date) {
        return Err(SlotError::ValidationError(
            "week_start_date must be a Monday".to_string(),
        ));
    }
    if pattern.start_time >= pattern.end_time {
        return Err(SlotError::ValidationError(
            "start_time must be before end_time".to_string(),
        ));
    }
    if !(1..=MINUTES_PER_DAY).contains(&pattern.slot_duration_minutes) {
        return Err(SlotError::ValidationError(format!(
            "slot_duration_minutes must be between 1 and {}",
            MINUTES_PER_DAY
        )));
    }
    if !(0..=MINUTES_PER_DAY).contains(&pattern.break_minutes) {
        return Err(SlotError::ValidationError(format!(
            "break_minutes must be between 0 and {}",
            MINUTES_PER_DAY
        )));
    }
    if let Some(lunch) = pattern.lunch {
        if lunch.start >= lunch.end {
            return Err(SlotError::ValidationError(
                "lunch window start must be before its end".to_string(),
            ));
        }
    }
    Ok(())
}
