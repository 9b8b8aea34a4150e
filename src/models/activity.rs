// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Bookable activity model and its per-date slot inventory.
//!
//! Capacity is stored sparsely: a date with no entry in `available_slots`
//! still has the full `daily_slots` remaining. Entries are created lazily the
//! first time a booking touches a date.

use crate::error::AppError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Whether an activity currently accepts bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    #[default]
    Active,
    Inactive,
}

impl ActivityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityStatus::Active => "active",
            ActivityStatus::Inactive => "inactive",
        }
    }
}

/// Remaining slots for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotOverride {
    pub date: NaiveDate,
    pub slots: u32,
}

/// Stored activity record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Activity ID (also used as document ID)
    pub id: String,
    /// Display name (e.g. "Sunrise Safari")
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
    pub price_per_person: f64,
    /// Default capacity for any calendar day
    pub daily_slots: u32,
    /// Per-date remaining capacity, only for dates that have been booked
    #[serde(default)]
    pub available_slots: Vec<SlotOverride>,
    #[serde(default)]
    pub status: ActivityStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Admin edits to an activity. `None` fields are left unchanged, and the
/// per-date slot inventory is never touched.
#[derive(Debug, Clone, Default)]
pub struct ActivityPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub price_per_person: Option<f64>,
    pub daily_slots: Option<u32>,
    pub status: Option<ActivityStatus>,
}

impl ActivityPatch {
    pub fn apply(&self, activity: &mut Activity, now: &str) {
        if let Some(name) = &self.name {
            activity.name = name.clone();
        }
        if let Some(description) = &self.description {
            activity.description = description.clone();
        }
        if let Some(location) = &self.location {
            activity.location = Some(location.clone());
        }
        if let Some(price) = self.price_per_person {
            activity.price_per_person = price;
        }
        if let Some(daily_slots) = self.daily_slots {
            activity.daily_slots = daily_slots;
        }
        if let Some(status) = self.status {
            activity.status = status;
        }
        activity.updated_at = now.to_string();
    }
}

impl Activity {
    fn override_mut(&mut self, date: NaiveDate) -> Option<&mut SlotOverride> {
        self.available_slots.iter_mut().find(|o| o.date == date)
    }

    /// Slots still available on `date`.
    pub fn slots_for_date(&self, date: NaiveDate) -> u32 {
        self.available_slots
            .iter()
            .find(|o| o.date == date)
            .map(|o| o.slots)
            .unwrap_or(self.daily_slots)
    }

    /// Take `count` slots from `date`, never going below zero.
    ///
    /// Returns the remaining slots for the date.
    pub fn update_slots(&mut self, date: NaiveDate, count: u32) -> u32 {
        if let Some(entry) = self.override_mut(date) {
            entry.slots = entry.slots.saturating_sub(count);
            return entry.slots;
        }

        let slots = self.daily_slots.saturating_sub(count);
        self.available_slots.push(SlotOverride { date, slots });
        slots
    }

    /// Check availability and take `count` slots in one step.
    ///
    /// Fails without touching the inventory if the activity is inactive or
    /// fewer than `count` slots remain.
    pub fn reserve(&mut self, date: NaiveDate, count: u32) -> Result<u32, AppError> {
        if self.status != ActivityStatus::Active {
            return Err(AppError::ActivityInactive(self.id.clone()));
        }

        let available = self.slots_for_date(date);
        if available < count {
            return Err(AppError::InsufficientSlots {
                date,
                available,
                requested: count,
            });
        }

        Ok(self.update_slots(date, count))
    }

    /// Give `count` slots back to `date`.
    ///
    /// The result never exceeds `daily_slots`. A date without an entry has
    /// never been decremented, so it is left at full capacity.
    pub fn restore_slots(&mut self, date: NaiveDate, count: u32) -> u32 {
        let daily_slots = self.daily_slots;
        let activity_id = self.id.clone();

        match self.override_mut(date) {
            Some(entry) => {
                let credited = entry.slots.saturating_add(count);
                if credited > daily_slots {
                    tracing::warn!(
                        activity_id = %activity_id,
                        %date,
                        credited,
                        daily_slots,
                        "Restored slots exceed daily capacity, clamping"
                    );
                }
                entry.slots = credited.min(daily_slots);
                entry.slots
            }
            None => {
                tracing::warn!(
                    activity_id = %activity_id,
                    %date,
                    count,
                    "Restore for a date with no recorded bookings, capacity already full"
                );
                daily_slots
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_activity(daily_slots: u32) -> Activity {
        Activity {
            id: "act-1".to_string(),
            name: "Sunrise Safari".to_string(),
            description: String::new(),
            location: None,
            price_per_person: 45.0,
            daily_slots,
            available_slots: vec![],
            status: ActivityStatus::Active,
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn test_unbooked_dates_have_full_capacity() {
        let activity = make_activity(10);
        assert_eq!(activity.slots_for_date(day(1)), 10);
        assert_eq!(
            activity.slots_for_date(NaiveDate::from_ymd_opt(1999, 12, 31).unwrap()),
            10
        );
    }

    #[test]
    fn test_update_slots_creates_override_once() {
        let mut activity = make_activity(10);

        assert_eq!(activity.update_slots(day(1), 4), 6);
        assert_eq!(activity.update_slots(day(1), 2), 4);

        assert_eq!(activity.available_slots.len(), 1);
        assert_eq!(activity.slots_for_date(day(1)), 4);
        assert_eq!(activity.slots_for_date(day(2)), 10);
    }

    #[test]
    fn test_update_slots_clamps_at_zero() {
        let mut activity = make_activity(5);

        assert_eq!(activity.update_slots(day(1), 8), 0);
        assert_eq!(activity.update_slots(day(1), 1), 0);
        assert_eq!(activity.slots_for_date(day(1)), 0);
    }

    #[test]
    fn test_reserve_rejects_shortfall_without_mutation() {
        let mut activity = make_activity(10);
        activity.reserve(day(1), 9).unwrap();

        let err = activity.reserve(day(1), 3).unwrap_err();

        match err {
            AppError::InsufficientSlots {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, 1);
                assert_eq!(requested, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(activity.slots_for_date(day(1)), 1);
    }

    #[test]
    fn test_reserve_rejects_inactive_activity() {
        let mut activity = make_activity(10);
        activity.status = ActivityStatus::Inactive;

        let err = activity.reserve(day(1), 1).unwrap_err();

        assert!(matches!(err, AppError::ActivityInactive(_)));
        assert!(activity.available_slots.is_empty());
    }

    #[test]
    fn test_restore_credits_existing_override() {
        let mut activity = make_activity(10);
        activity.update_slots(day(1), 7);

        assert_eq!(activity.restore_slots(day(1), 4), 7);
    }

    #[test]
    fn test_restore_clamps_at_daily_capacity() {
        let mut activity = make_activity(10);
        activity.update_slots(day(1), 2);

        assert_eq!(activity.restore_slots(day(1), 5), 10);
    }

    #[test]
    fn test_restore_without_override_keeps_full_capacity() {
        let mut activity = make_activity(10);
        activity.update_slots(day(2), 3);

        assert_eq!(activity.restore_slots(day(1), 4), 10);
        assert_eq!(activity.available_slots.len(), 1);
        assert_eq!(activity.slots_for_date(day(2)), 7);
    }

    #[test]
    fn test_daily_capacity_scenario() {
        let mut activity = make_activity(10);

        assert_eq!(activity.reserve(day(1), 4).unwrap(), 6);
        assert_eq!(activity.reserve(day(1), 5).unwrap(), 1);
        assert!(activity.reserve(day(1), 3).is_err());
        assert_eq!(activity.slots_for_date(day(1)), 1);

        assert_eq!(activity.restore_slots(day(1), 4), 5);
    }

    #[test]
    fn test_patch_keeps_slot_inventory() {
        let mut activity = make_activity(10);
        activity.update_slots(day(1), 4);

        let patch = ActivityPatch {
            name: Some("Sunset Safari".to_string()),
            daily_slots: Some(12),
            ..Default::default()
        };
        patch.apply(&mut activity, "2024-02-01T00:00:00Z");

        assert_eq!(activity.name, "Sunset Safari");
        assert_eq!(activity.daily_slots, 12);
        assert_eq!(activity.slots_for_date(day(1)), 6);
        assert_eq!(activity.slots_for_date(day(2)), 12);
        assert_eq!(activity.updated_at, "2024-02-01T00:00:00Z");
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&ActivityStatus::Inactive).unwrap();
        assert_eq!(json, "\"inactive\"");
    }
}
