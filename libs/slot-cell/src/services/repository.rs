use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::models::{Slot, SlotError};

const SLOTS_TABLE: &str = "available_slots";

/// Durable slot storage. Guarded mutations return `false`/`None` when their
/// guard no longer holds so callers can report a conflict.
#[async_trait]
pub trait SlotRepository: Send + Sync {
    async fn insert(&self, slot: Slot) -> Result<Slot, SlotError>;

    async fn get(&self, slot_id: Uuid) -> Result<Option<Slot>, SlotError>;

    async fn list_for_week(
        &self,
        provider_id: Uuid,
        week_start_date: NaiveDate,
        day_of_week: Option<i32>,
    ) -> Result<Vec<Slot>, SlotError>;

    async fn list_unbooked(
        &self,
        provider_id: Option<Uuid>,
        week_start_date: Option<NaiveDate>,
    ) -> Result<Vec<Slot>, SlotError>;

    /// Replaces day, times and week of an unbooked slot.
    async fn update_unbooked(&self, slot: &Slot) -> Result<Option<Slot>, SlotError>;

    async fn delete_unbooked(&self, slot_id: Uuid) -> Result<bool, SlotError>;

    /// Sets `is_booked = new` only if it currently equals `expected`.
    async fn compare_and_set_booked(
        &self,
        slot_id: Uuid,
        expected: bool,
        new: bool,
    ) -> Result<bool, SlotError>;

    /// Removes unbooked slots whose week starts before `week_start_date`.
    async fn delete_unbooked_before(&self, week_start_date: NaiveDate) -> Result<Vec<Slot>, SlotError>;
}

// ==============================================================================
// IN-MEMORY BACKEND
// ==============================================================================

#[derive(Default, Clone)]
pub struct InMemorySlotRepository {
    slots: Arc<RwLock<HashMap<Uuid, Slot>>>,
}

impl InMemorySlotRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_slots(slots: &mut [Slot]) {
    slots.sort_by_key(|s| (s.week_start_date, s.day_of_week, s.start_time));
}

#[async_trait]
impl SlotRepository for InMemorySlotRepository {
    async fn insert(&self, slot: Slot) -> Result<Slot, SlotError> {
        let mut slots = self.slots.write().await;
        if slots.contains_key(&slot.id) {
            return Err(SlotError::Conflict(format!("slot {} already exists", slot.id)));
        }
        slots.insert(slot.id, slot.clone());
        Ok(slot)
    }

    async fn get(&self, slot_id: Uuid) -> Result<Option<Slot>, SlotError> {
        Ok(self.slots.read().await.get(&slot_id).cloned())
    }

    async fn list_for_week(
        &self,
        provider_id: Uuid,
        week_start_date: NaiveDate,
        day_of_week: Option<i32>,
    ) -> Result<Vec<Slot>, SlotError> {
        let mut found: Vec<Slot> = self
            .slots
            .read()
            .await
            .values()
            .filter(|s| s.provider_id == provider_id && s.week_start_date == week_start_date)
            .filter(|s| day_of_week.map_or(true, |day| s.day_of_week == day))
            .cloned()
            .collect();
        sort_slots(&mut found);
        Ok(found)
    }

    async fn list_unbooked(
        &self,
        provider_id: Option<Uuid>,
        week_start_date: Option<NaiveDate>,
    ) -> Result<Vec<Slot>, SlotError> {
        let mut found: Vec<Slot> = self
            .slots
            .read()
            .await
            .values()
            .filter(|s| !s.is_booked)
            .filter(|s| provider_id.map_or(true, |id| s.provider_id == id))
            .filter(|s| week_start_date.map_or(true, |week| s.week_start_date == week))
            .cloned()
            .collect();
        sort_slots(&mut found);
        Ok(found)
    }

    async fn update_unbooked(&self, slot: &Slot) -> Result<Option<Slot>, SlotError> {
        let mut slots = self.slots.write().await;
        match slots.get_mut(&slot.id) {
            Some(stored) if !stored.is_booked => {
                stored.day_of_week = slot.day_of_week;
                stored.start_time = slot.start_time;
                stored.end_time = slot.end_time;
                stored.week_start_date = slot.week_start_date;
                stored.updated_at = Utc::now();
                Ok(Some(stored.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_unbooked(&self, slot_id: Uuid) -> Result<bool, SlotError> {
        let mut slots = self.slots.write().await;
        match slots.get(&slot_id) {
            Some(stored) if !stored.is_booked => {
                slots.remove(&slot_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn compare_and_set_booked(
        &self,
        slot_id: Uuid,
        expected: bool,
        new: bool,
    ) -> Result<bool, SlotError> {
        let mut slots = self.slots.write().await;
        match slots.get_mut(&slot_id) {
            Some(stored) if stored.is_booked == expected => {
                stored.is_booked = new;
                stored.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_unbooked_before(&self, week_start_date: NaiveDate) -> Result<Vec<Slot>, SlotError> {
        let mut slots = self.slots.write().await;
        let stale: Vec<Uuid> = slots
            .values()
            .filter(|s| !s.is_booked && s.week_start_date < week_start_date)
            .map(|s| s.id)
            .collect();

        Ok(stale.iter().filter_map(|id| slots.remove(id)).collect())
    }
}

// ==============================================================================
// POSTGREST BACKEND
// ==============================================================================

pub struct SupabaseSlotRepository {
    client: Arc<SupabaseClient>,
}

impl SupabaseSlotRepository {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SlotRepository for SupabaseSlotRepository {
    async fn insert(&self, slot: Slot) -> Result<Slot, SlotError> {
        debug!("Inserting slot {} for provider {}", slot.id, slot.provider_id);
        let row = serde_json::to_value(&slot)
            .map_err(|e| SlotError::DatabaseError(e.to_string()))?;
        Ok(self.client.insert(SLOTS_TABLE, row).await?)
    }

    async fn get(&self, slot_id: Uuid) -> Result<Option<Slot>, SlotError> {
        let query = format!("id=eq.{}", slot_id);
        let rows: Vec<Slot> = self.client.select(SLOTS_TABLE, &query).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_for_week(
        &self,
        provider_id: Uuid,
        week_start_date: NaiveDate,
        day_of_week: Option<i32>,
    ) -> Result<Vec<Slot>, SlotError> {
        let mut query = format!(
            "provider_id=eq.{}&week_start_date=eq.{}",
            provider_id, week_start_date
        );
        if let Some(day) = day_of_week {
            query.push_str(&format!("&day_of_week=eq.{}", day));
        }
        query.push_str("&order=day_of_week.asc,start_time.asc");

        Ok(self.client.select(SLOTS_TABLE, &query).await?)
    }

    async fn list_unbooked(
        &self,
        provider_id: Option<Uuid>,
        week_start_date: Option<NaiveDate>,
    ) -> Result<Vec<Slot>, SlotError> {
        let mut query = "is_booked=eq.false".to_string();
        if let Some(id) = provider_id {
            query.push_str(&format!("&provider_id=eq.{}", id));
        }
        if let Some(week) = week_start_date {
            query.push_str(&format!("&week_start_date=eq.{}", week));
        }
        query.push_str("&order=week_start_date.asc,day_of_week.asc,start_time.asc");

        Ok(self.client.select(SLOTS_TABLE, &query).await?)
    }

    async fn update_unbooked(&self, slot: &Slot) -> Result<Option<Slot>, SlotError> {
        let filter = format!("id=eq.{}&is_booked=eq.false", slot.id);
        let changes = json!({
            "day_of_week": slot.day_of_week,
            "start_time": slot.start_time,
            "end_time": slot.end_time,
            "week_start_date": slot.week_start_date,
            "updated_at": Utc::now(),
        });

        let rows: Vec<Slot> = self.client.update(SLOTS_TABLE, &filter, changes).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete_unbooked(&self, slot_id: Uuid) -> Result<bool, SlotError> {
        let filter = format!("id=eq.{}&is_booked=eq.false", slot_id);
        let rows: Vec<Slot> = self.client.delete(SLOTS_TABLE, &filter).await?;
        Ok(!rows.is_empty())
    }

    async fn compare_and_set_booked(
        &self,
        slot_id: Uuid,
        expected: bool,
        new: bool,
    ) -> Result<bool, SlotError> {
        let filter = format!("id=eq.{}&is_booked=eq.{}", slot_id, expected);
        let changes = json!({ "is_booked": new, "updated_at": Utc::now() });

        let rows: Vec<Slot> = self.client.update(SLOTS_TABLE, &filter, changes).await?;
        debug!("Booked flag CAS on slot {} matched {} rows", slot_id, rows.len());
        Ok(!rows.is_empty())
    }

    async fn delete_unbooked_before(&self, week_start_date: NaiveDate) -> Result<Vec<Slot>, SlotError> {
        let filter = format!("is_booked=eq.false&week_start_date=lt.{}", week_start_date);
        Ok(self.client.delete(SLOTS_TABLE, &filter).await?)
    }
}
