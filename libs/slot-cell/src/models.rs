use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::SupabaseError;
use shared_models::error::AppError;

// ==============================================================================
// SLOT MODELS
// ==============================================================================

/// One bookable window for one provider in one calendar week.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slot {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub day_of_week: i32, // 0 = Monday, 6 = Sunday
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub week_start_date: NaiveDate,
    pub is_booked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Slot {
    pub fn new(
        provider_id: Uuid,
        week_start_date: NaiveDate,
        day_of_week: i32,
        window: TimeWindow,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            provider_id,
            day_of_week,
            start_time: window.start,
            end_time: window.end,
            week_start_date,
            is_booked: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time, self.end_time)
    }

    /// Calendar date the slot falls on.
    pub fn date(&self) -> NaiveDate {
        self.week_start_date + Duration::days(self.day_of_week as i64)
    }

    pub fn starts_at(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.date().and_time(self.start_time))
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.date().and_time(self.end_time))
    }
}

/// Half-open time range `[start, end)` within a day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && self.end > other.start
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSlotRequest {
    pub provider_id: Uuid,
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub week_start_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSlotRequest {
    pub day_of_week: Option<i32>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub week_start_date: Option<NaiveDate>,
}

fn default_slot_duration() -> i64 {
    30
}

fn default_break_minutes() -> i64 {
    15
}

/// Recurring daily layout used to generate a week of slots in one call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotPattern {
    pub week_start_date: NaiveDate,
    pub days_of_week: Vec<i32>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default = "default_slot_duration")]
    pub slot_duration_minutes: i64,
    #[serde(default = "default_break_minutes")]
    pub break_minutes: i64,
    #[serde(default)]
    pub lunch: Option<TimeWindow>,
    #[serde(default)]
    pub exclude_windows: Vec<TimeWindow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkCreateSlotsRequest {
    pub provider_id: Uuid,
    #[serde(flatten)]
    pub pattern: SlotPattern,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkCreateResult {
    pub created: Vec<Slot>,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlotQuery {
    pub provider_id: Option<Uuid>,
    pub week_start_date: Option<NaiveDate>,
    pub day_of_week: Option<i32>,
}

pub fn is_monday(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Mon
}

/// Monday of the week containing `date`.
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum SlotError {
    #[error("Slot not found")]
    NotFound,

    #[error("Slot conflict: {0}")]
    Conflict(String),

    #[error("Invalid slot state: {0}")]
    InvalidState(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<SupabaseError> for SlotError {
    fn from(err: SupabaseError) -> Self {
        match err {
            SupabaseError::Conflict(msg) => SlotError::Conflict(msg),
            other => SlotError::DatabaseError(other.to_string()),
        }
    }
}

impl From<SlotError> for AppError {
    fn from(err: SlotError) -> Self {
        match err {
            SlotError::NotFound => AppError::NotFound("Slot not found".to_string()),
            SlotError::Conflict(msg) => AppError::Conflict(msg),
            SlotError::InvalidState(msg) => AppError::InvalidState(msg),
            SlotError::ValidationError(msg) => AppError::ValidationError(msg),
            SlotError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_slot_instants_use_week_offset() {
        let week = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let slot = Slot::new(Uuid::new_v4(), week, 2, TimeWindow::new(time(9, 0), time(9, 30)));

        assert_eq!(slot.date(), NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(slot.starts_at().to_rfc3339(), "2024-01-03T09:00:00+00:00");
        assert_eq!(slot.ends_at().to_rfc3339(), "2024-01-03T09:30:00+00:00");
    }

    #[test]
    fn test_week_start_of_returns_monday() {
        let sunday = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        assert_eq!(week_start_of(sunday), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!(is_monday(week_start_of(sunday)));
    }

    #[test]
    fn test_touching_windows_do_not_overlap() {
        let a = TimeWindow::new(time(9, 0), time(9, 30));
        let b = TimeWindow::new(time(9, 30), time(10, 0));
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&TimeWindow::new(time(9, 29), time(9, 45))));
    }
}
