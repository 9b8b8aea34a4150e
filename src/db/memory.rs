// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store for local development and tests.
//!
//! All booking mutations for an activity are serialized on that activity's
//! async mutex, so the read-check-write on its slot inventory is atomic with
//! respect to other requests in this process.

use super::{BookingChange, BookingFilter, RestoreOutcome, Store};
use crate::error::AppError;
use crate::models::{Activity, ActivityBooking, ActivityPatch, BookingStatus};
use crate::time_utils::now_rfc3339;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-activity locks guarding slot inventory updates.
type ActivityLocks = DashMap<String, Arc<Mutex<()>>>;

#[derive(Default)]
pub struct MemoryDb {
    activities: DashMap<String, Activity>,
    bookings: DashMap<String, ActivityBooking>,
    activity_locks: ActivityLocks,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, activity_id: &str) -> Arc<Mutex<()>> {
        self.activity_locks
            .entry(activity_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn booking_or_not_found(&self, booking_id: &str) -> Result<ActivityBooking, AppError> {
        self.bookings
            .get(booking_id)
            .map(|b| b.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", booking_id)))
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.activity_locks.len()
    }

    fn activity_not_found(activity_id: &str) -> AppError {
        AppError::NotFound(format!("Activity {} not found", activity_id))
    }

    /// Drop an activity while bookings still point at it.
    #[cfg(test)]
    pub(crate) fn remove_activity_unchecked(&self, activity_id: &str) {
        self.activities.remove(activity_id);
    }

    /// Credit the booking's slots back. Caller must hold the activity lock.
    fn restore_locked(&self, booking: &ActivityBooking) -> RestoreOutcome {
        match self.activities.get_mut(&booking.activity_id) {
            Some(mut activity) => {
                let available_slots = activity
                    .restore_slots(booking.preferred_date, booking.number_of_participants);
                activity.updated_at = now_rfc3339();
                RestoreOutcome::Restored { available_slots }
            }
            None => {
                tracing::warn!(
                    booking_id = %booking.id,
                    activity_id = %booking.activity_id,
                    "Activity missing, slots not restored"
                );
                RestoreOutcome::ActivityMissing
            }
        }
    }
}

#[async_trait]
impl Store for MemoryDb {
    async fn get_activity(&self, activity_id: &str) -> Result<Option<Activity>, AppError> {
        Ok(self.activities.get(activity_id).map(|a| a.value().clone()))
    }

    async fn list_activities(&self) -> Result<Vec<Activity>, AppError> {
        let mut activities: Vec<Activity> =
            self.activities.iter().map(|a| a.value().clone()).collect();
        activities.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(activities)
    }

    async fn upsert_activity(&self, activity: &Activity) -> Result<(), AppError> {
        let lock = self.lock_for(&activity.id);
        let _guard = lock.lock().await;
        self.activities.insert(activity.id.clone(), activity.clone());
        Ok(())
    }

    async fn update_activity(
        &self,
        activity_id: &str,
        patch: &ActivityPatch,
    ) -> Result<Activity, AppError> {
        if !self.activities.contains_key(activity_id) {
            return Err(Self::activity_not_found(activity_id));
        }
        let lock = self.lock_for(activity_id);
        let _guard = lock.lock().await;

        let mut activity = self
            .activities
            .get_mut(activity_id)
            .ok_or_else(|| Self::activity_not_found(activity_id))?;
        patch.apply(&mut activity, &now_rfc3339());
        Ok(activity.clone())
    }

    async fn delete_activity(&self, activity_id: &str) -> Result<(), AppError> {
        if !self.activities.contains_key(activity_id) {
            return Err(Self::activity_not_found(activity_id));
        }
        let lock = self.lock_for(activity_id);
        let _guard = lock.lock().await;

        let holding = self
            .bookings
            .iter()
            .filter(|b| b.activity_id == activity_id && b.status.holds_slots())
            .count();
        if holding > 0 {
            return Err(AppError::Conflict(format!(
                "Activity {} still has {} active bookings",
                activity_id, holding
            )));
        }

        self.activities
            .remove(activity_id)
            .ok_or_else(|| Self::activity_not_found(activity_id))?;

        // Waiters still holding the old mutex will find the activity gone.
        self.activity_locks.remove(activity_id);
        Ok(())
    }

    async fn get_booking(&self, booking_id: &str) -> Result<Option<ActivityBooking>, AppError> {
        Ok(self.bookings.get(booking_id).map(|b| b.value().clone()))
    }

    async fn list_bookings(
        &self,
        filter: &BookingFilter,
    ) -> Result<Vec<ActivityBooking>, AppError> {
        let mut bookings: Vec<ActivityBooking> = self
            .bookings
            .iter()
            .filter(|b| filter.matches(b.value()))
            .map(|b| b.value().clone())
            .collect();
        bookings.sort_by(|a, b| {
            a.preferred_date
                .cmp(&b.preferred_date)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(bookings)
    }

    async fn create_booking(&self, booking: &ActivityBooking) -> Result<u32, AppError> {
        let lock = self.lock_for(&booking.activity_id);
        let _guard = lock.lock().await;

        let mut activity = self
            .activities
            .get(&booking.activity_id)
            .map(|a| a.value().clone())
            .ok_or_else(|| Self::activity_not_found(&booking.activity_id))?;

        let remaining = activity.reserve(booking.preferred_date, booking.number_of_participants)?;
        activity.updated_at = now_rfc3339();

        self.activities.insert(activity.id.clone(), activity);
        self.bookings.insert(booking.id.clone(), booking.clone());

        Ok(remaining)
    }

    async fn update_booking_status(
        &self,
        booking_id: &str,
        status: BookingStatus,
    ) -> Result<BookingChange, AppError> {
        let activity_id = self.booking_or_not_found(booking_id)?.activity_id;
        let lock = self.lock_for(&activity_id);
        let _guard = lock.lock().await;

        // Re-read under the lock; a concurrent request may have changed it.
        let mut booking = self.booking_or_not_found(booking_id)?;
        let releases = booking.transition_to(status, &now_rfc3339())?;

        let restore = if releases {
            self.restore_locked(&booking)
        } else {
            RestoreOutcome::NotNeeded
        };

        self.bookings.insert(booking.id.clone(), booking.clone());
        Ok(BookingChange { booking, restore })
    }

    async fn delete_booking(&self, booking_id: &str) -> Result<BookingChange, AppError> {
        let activity_id = self.booking_or_not_found(booking_id)?.activity_id;
        let lock = self.lock_for(&activity_id);
        let _guard = lock.lock().await;

        let (_, booking) = self
            .bookings
            .remove(booking_id)
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", booking_id)))?;

        let restore = if booking.status.holds_slots() {
            self.restore_locked(&booking)
        } else {
            RestoreOutcome::NotNeeded
        };

        Ok(BookingChange { booking, restore })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityStatus;

    fn activity(id: &str) -> Activity {
        Activity {
            id: id.to_string(),
            name: "Night Walk".to_string(),
            description: String::new(),
            location: None,
            price_per_person: 10.0,
            daily_slots: 5,
            available_slots: vec![],
            status: ActivityStatus::Active,
            created_at: now_rfc3339(),
            updated_at: now_rfc3339(),
        }
    }

    #[tokio::test]
    async fn test_unknown_activity_does_not_leave_a_lock() {
        let db = MemoryDb::new();

        let patch = ActivityPatch::default();
        assert!(matches!(
            db.update_activity("ghost", &patch).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            db.delete_activity("ghost").await,
            Err(AppError::NotFound(_))
        ));

        assert_eq!(db.lock_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_activity_releases_its_lock() {
        let db = MemoryDb::new();
        db.upsert_activity(&activity("owls")).await.unwrap();
        assert_eq!(db.lock_count(), 1);

        db.delete_activity("owls").await.unwrap();

        assert_eq!(db.lock_count(), 0);
        assert!(db.get_activity("owls").await.unwrap().is_none());
    }
}
