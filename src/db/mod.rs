// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! Every slot mutation runs inside a single atomic unit together with the
//! booking write it belongs to, so availability checks and decrements can
//! never interleave between requests.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::config::{Config, StorageBackend};
use crate::error::AppError;
use crate::models::{Activity, ActivityBooking, ActivityPatch, BookingStatus};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Collection names as constants.
pub mod collections {
    pub const ACTIVITIES: &str = "activities";
    pub const ACTIVITY_BOOKINGS: &str = "activity_bookings";
}

/// Filter for booking listings. `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub user_id: Option<String>,
    pub activity_id: Option<String>,
    pub status: Option<BookingStatus>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &ActivityBooking) -> bool {
        self.user_id.as_ref().is_none_or(|u| *u == booking.user_id)
            && self
                .activity_id
                .as_ref()
                .is_none_or(|a| *a == booking.activity_id)
            && self.status.is_none_or(|s| s == booking.status)
    }
}

/// What happened to the activity inventory when a booking let go of its slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The booking did not hold slots (already cancelled, or status unchanged).
    NotNeeded,
    /// Slots were credited back; the date now has `available_slots`.
    Restored { available_slots: u32 },
    /// The referenced activity no longer exists, nothing could be credited.
    ActivityMissing,
}

/// Result of a booking status change or deletion.
#[derive(Debug, Clone)]
pub struct BookingChange {
    pub booking: ActivityBooking,
    pub restore: RestoreOutcome,
}

/// Storage operations for activities and bookings.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_activity(&self, activity_id: &str) -> Result<Option<Activity>, AppError>;

    async fn list_activities(&self) -> Result<Vec<Activity>, AppError>;

    /// Create or replace an activity document.
    async fn upsert_activity(&self, activity: &Activity) -> Result<(), AppError>;

    /// Atomically apply admin edits without disturbing the slot inventory.
    async fn update_activity(
        &self,
        activity_id: &str,
        patch: &ActivityPatch,
    ) -> Result<Activity, AppError>;

    /// Delete an activity. Fails with `Conflict` while any booking still
    /// holds slots on it.
    async fn delete_activity(&self, activity_id: &str) -> Result<(), AppError>;

    async fn get_booking(&self, booking_id: &str) -> Result<Option<ActivityBooking>, AppError>;

    async fn list_bookings(&self, filter: &BookingFilter)
        -> Result<Vec<ActivityBooking>, AppError>;

    /// Atomically reserve the booking's slots and store the booking.
    ///
    /// Returns the slots remaining on the booking's date.
    async fn create_booking(&self, booking: &ActivityBooking) -> Result<u32, AppError>;

    /// Atomically change a booking's status, restoring slots if the booking
    /// stops holding them.
    async fn update_booking_status(
        &self,
        booking_id: &str,
        status: BookingStatus,
    ) -> Result<BookingChange, AppError>;

    /// Atomically delete a booking, restoring slots if it still held them.
    async fn delete_booking(&self, booking_id: &str) -> Result<BookingChange, AppError>;
}

/// Open the configured store, retrying the initial Firestore connection.
pub async fn connect(config: &Config) -> Result<Arc<dyn Store>, AppError> {
    match config.storage {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, data will not survive a restart");
            Ok(Arc::new(MemoryDb::new()))
        }
        StorageBackend::Firestore => {
            let delay = Duration::from_secs(config.db_connect_retry_secs);
            let mut attempt = 1;
            loop {
                match FirestoreDb::new(&config.gcp_project_id).await {
                    Ok(db) => return Ok(Arc::new(db)),
                    Err(e) if attempt < config.db_connect_attempts => {
                        tracing::warn!(
                            attempt,
                            max_attempts = config.db_connect_attempts,
                            retry_in_secs = config.db_connect_retry_secs,
                            error = %e,
                            "Database connection failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }
}
