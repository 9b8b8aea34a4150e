// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Activities (catalogue and per-date slot inventory)
//! - Activity bookings
//!
//! Slot inventory changes read the activity inside a Firestore transaction
//! and commit it together with the booking write. A commit that loses a
//! race is retried from scratch with fresh reads.

use super::{collections, BookingChange, BookingFilter, RestoreOutcome, Store};
use crate::error::AppError;
use crate::models::{Activity, ActivityBooking, ActivityPatch, BookingStatus};
use crate::time_utils::now_rfc3339;
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use firestore::{FirestoreConsistencySelector, FirestoreTransaction};
use std::time::Duration;

/// Attempts before giving up on a contended transaction.
const MAX_TRANSACTION_ATTEMPTS: u32 = 5;

/// First retry delay, doubled on each further attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(50);

/// Only aborted or unavailable commits are worth another attempt.
fn is_retryable(err: &FirestoreError) -> bool {
    match err {
        FirestoreError::DatabaseError(db) => db.retry_possible,
        FirestoreError::NetworkError(_) => true,
        _ => false,
    }
}

fn retry_delay(attempt: u32) -> Duration {
    RETRY_BASE_DELAY * 2u32.pow(attempt.saturating_sub(1).min(4))
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    async fn begin<'a>(
        client: &'a firestore::FirestoreDb,
    ) -> Result<(FirestoreTransaction<'a>, firestore::FirestoreDb), AppError> {
        let transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // Reads through this handle participate in the transaction.
        let tx_db = client.clone_with_consistency_selector(FirestoreConsistencySelector::Transaction(
            transaction.transaction_id().clone(),
        ));

        Ok((transaction, tx_db))
    }

    /// Commit staged writes, or roll back if staging failed.
    ///
    /// Returns `Ok(None)` when the commit lost a race and should be retried
    /// after a backoff. Other commit failures, and a contended commit on the
    /// last attempt, are returned with the Firestore error text.
    async fn finish<T>(
        transaction: FirestoreTransaction<'_>,
        staged: Result<T, AppError>,
        operation: &'static str,
        attempt: u32,
    ) -> Result<Option<T>, AppError> {
        let value = match staged {
            Ok(value) => value,
            Err(err) => {
                if let Err(e) = transaction.rollback().await {
                    tracing::warn!(operation, error = %e, "Transaction rollback failed");
                }
                return Err(err);
            }
        };

        match transaction.commit().await {
            Ok(_) => Ok(Some(value)),
            Err(e) if is_retryable(&e) && attempt < MAX_TRANSACTION_ATTEMPTS => {
                let delay = retry_delay(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = MAX_TRANSACTION_ATTEMPTS,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transaction commit contended, retrying"
                );
                tokio::time::sleep(delay).await;
                Ok(None)
            }
            Err(e) => Err(AppError::Database(format!(
                "{} commit failed on attempt {}: {}",
                operation, attempt, e
            ))),
        }
    }

    fn exhausted(operation: &str) -> AppError {
        AppError::Database(format!(
            "{} did not commit after {} attempts",
            operation, MAX_TRANSACTION_ATTEMPTS
        ))
    }

    async fn read_activity(
        tx_db: &firestore::FirestoreDb,
        activity_id: &str,
    ) -> Result<Option<Activity>, AppError> {
        tx_db
            .fluent()
            .select()
            .by_id_in(collections::ACTIVITIES)
            .obj()
            .one(activity_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to read activity: {}", e)))
    }

    async fn read_booking(
        tx_db: &firestore::FirestoreDb,
        booking_id: &str,
    ) -> Result<ActivityBooking, AppError> {
        let booking: Option<ActivityBooking> = tx_db
            .fluent()
            .select()
            .by_id_in(collections::ACTIVITY_BOOKINGS)
            .obj()
            .one(booking_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to read booking: {}", e)))?;

        booking.ok_or_else(|| AppError::NotFound(format!("Booking {} not found", booking_id)))
    }

    fn stage_activity(
        client: &firestore::FirestoreDb,
        transaction: &mut FirestoreTransaction<'_>,
        activity: &Activity,
    ) -> Result<(), AppError> {
        client
            .fluent()
            .update()
            .in_col(collections::ACTIVITIES)
            .document_id(&activity.id)
            .object(activity)
            .add_to_transaction(transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add activity to transaction: {}", e))
            })?;
        Ok(())
    }

    fn stage_booking(
        client: &firestore::FirestoreDb,
        transaction: &mut FirestoreTransaction<'_>,
        booking: &ActivityBooking,
    ) -> Result<(), AppError> {
        client
            .fluent()
            .update()
            .in_col(collections::ACTIVITY_BOOKINGS)
            .document_id(&booking.id)
            .object(booking)
            .add_to_transaction(transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add booking to transaction: {}", e))
            })?;
        Ok(())
    }

    /// Credit a booking's slots back to its activity within the transaction.
    async fn stage_restore(
        client: &firestore::FirestoreDb,
        tx_db: &firestore::FirestoreDb,
        transaction: &mut FirestoreTransaction<'_>,
        booking: &ActivityBooking,
    ) -> Result<RestoreOutcome, AppError> {
        let Some(mut activity) = Self::read_activity(tx_db, &booking.activity_id).await? else {
            tracing::warn!(
                booking_id = %booking.id,
                activity_id = %booking.activity_id,
                "Activity missing, slots not restored"
            );
            return Ok(RestoreOutcome::ActivityMissing);
        };

        let available_slots =
            activity.restore_slots(booking.preferred_date, booking.number_of_participants);
        activity.updated_at = now_rfc3339();
        Self::stage_activity(client, transaction, &activity)?;

        Ok(RestoreOutcome::Restored { available_slots })
    }

    async fn stage_create_booking(
        client: &firestore::FirestoreDb,
        tx_db: &firestore::FirestoreDb,
        transaction: &mut FirestoreTransaction<'_>,
        booking: &ActivityBooking,
    ) -> Result<u32, AppError> {
        let mut activity = Self::read_activity(tx_db, &booking.activity_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Activity {} not found", booking.activity_id))
            })?;

        let remaining = activity.reserve(booking.preferred_date, booking.number_of_participants)?;
        activity.updated_at = now_rfc3339();

        Self::stage_activity(client, transaction, &activity)?;
        Self::stage_booking(client, transaction, booking)?;

        Ok(remaining)
    }

    async fn stage_status_change(
        client: &firestore::FirestoreDb,
        tx_db: &firestore::FirestoreDb,
        transaction: &mut FirestoreTransaction<'_>,
        booking_id: &str,
        status: BookingStatus,
    ) -> Result<BookingChange, AppError> {
        let mut booking = Self::read_booking(tx_db, booking_id).await?;
        let releases = booking.transition_to(status, &now_rfc3339())?;

        let restore = if releases {
            Self::stage_restore(client, tx_db, transaction, &booking).await?
        } else {
            RestoreOutcome::NotNeeded
        };

        Self::stage_booking(client, transaction, &booking)?;
        Ok(BookingChange { booking, restore })
    }

    async fn stage_delete_booking(
        client: &firestore::FirestoreDb,
        tx_db: &firestore::FirestoreDb,
        transaction: &mut FirestoreTransaction<'_>,
        booking_id: &str,
    ) -> Result<BookingChange, AppError> {
        let booking = Self::read_booking(tx_db, booking_id).await?;

        let restore = if booking.status.holds_slots() {
            Self::stage_restore(client, tx_db, transaction, &booking).await?
        } else {
            RestoreOutcome::NotNeeded
        };

        client
            .fluent()
            .delete()
            .from(collections::ACTIVITY_BOOKINGS)
            .document_id(&booking.id)
            .add_to_transaction(transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add deletion to transaction: {}", e))
            })?;

        Ok(BookingChange { booking, restore })
    }

    async fn stage_update_activity(
        client: &firestore::FirestoreDb,
        tx_db: &firestore::FirestoreDb,
        transaction: &mut FirestoreTransaction<'_>,
        activity_id: &str,
        patch: &ActivityPatch,
    ) -> Result<Activity, AppError> {
        let mut activity = Self::read_activity(tx_db, activity_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", activity_id)))?;

        patch.apply(&mut activity, &now_rfc3339());
        Self::stage_activity(client, transaction, &activity)?;

        Ok(activity)
    }

    async fn stage_delete_activity(
        client: &firestore::FirestoreDb,
        tx_db: &firestore::FirestoreDb,
        transaction: &mut FirestoreTransaction<'_>,
        activity_id: &str,
    ) -> Result<(), AppError> {
        if Self::read_activity(tx_db, activity_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Activity {} not found",
                activity_id
            )));
        }

        let id = activity_id.to_string();
        let bookings: Vec<ActivityBooking> = tx_db
            .fluent()
            .select()
            .from(collections::ACTIVITY_BOOKINGS)
            .filter(move |q| q.for_all([q.field("activity_id").eq(id.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let holding = bookings.iter().filter(|b| b.status.holds_slots()).count();
        if holding > 0 {
            return Err(AppError::Conflict(format!(
                "Activity {} still has {} active bookings",
                activity_id, holding
            )));
        }

        client
            .fluent()
            .delete()
            .from(collections::ACTIVITIES)
            .document_id(activity_id)
            .add_to_transaction(transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add deletion to transaction: {}", e))
            })?;

        Ok(())
    }
}

#[async_trait]
impl Store for FirestoreDb {
    // ─── Activity Operations ─────────────────────────────────────

    async fn get_activity(&self, activity_id: &str) -> Result<Option<Activity>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ACTIVITIES)
            .obj()
            .one(activity_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_activities(&self) -> Result<Vec<Activity>, AppError> {
        let mut activities: Vec<Activity> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        activities.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(activities)
    }

    async fn upsert_activity(&self, activity: &Activity) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ACTIVITIES)
            .document_id(&activity.id)
            .object(activity)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn update_activity(
        &self,
        activity_id: &str,
        patch: &ActivityPatch,
    ) -> Result<Activity, AppError> {
        let client = self.get_client()?;

        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            let (mut transaction, tx_db) = Self::begin(client).await?;
            let staged =
                Self::stage_update_activity(client, &tx_db, &mut transaction, activity_id, patch)
                    .await;
            if let Some(activity) =
                Self::finish(transaction, staged, "update_activity", attempt).await?
            {
                return Ok(activity);
            }
        }

        Err(Self::exhausted("update_activity"))
    }

    async fn delete_activity(&self, activity_id: &str) -> Result<(), AppError> {
        let client = self.get_client()?;

        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            let (mut transaction, tx_db) = Self::begin(client).await?;
            let staged =
                Self::stage_delete_activity(client, &tx_db, &mut transaction, activity_id).await;
            if let Some(()) = Self::finish(transaction, staged, "delete_activity", attempt).await? {
                tracing::info!(activity_id, "Activity deleted");
                return Ok(());
            }
        }

        Err(Self::exhausted("delete_activity"))
    }

    // ─── Booking Operations ──────────────────────────────────────

    async fn get_booking(&self, booking_id: &str) -> Result<Option<ActivityBooking>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ACTIVITY_BOOKINGS)
            .obj()
            .one(booking_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_bookings(
        &self,
        filter: &BookingFilter,
    ) -> Result<Vec<ActivityBooking>, AppError> {
        let user_id = filter.user_id.clone();
        let activity_id = filter.activity_id.clone();
        let status = filter.status.map(|s| s.as_str());

        let mut bookings: Vec<ActivityBooking> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITY_BOOKINGS)
            .filter(move |q| {
                q.for_all([
                    user_id.clone().and_then(|u| q.field("user_id").eq(u)),
                    activity_id.clone().and_then(|a| q.field("activity_id").eq(a)),
                    status.and_then(|s| q.field("status").eq(s)),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        bookings.sort_by(|a, b| {
            a.preferred_date
                .cmp(&b.preferred_date)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(bookings)
    }

    async fn create_booking(&self, booking: &ActivityBooking) -> Result<u32, AppError> {
        let client = self.get_client()?;

        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            let (mut transaction, tx_db) = Self::begin(client).await?;
            let staged =
                Self::stage_create_booking(client, &tx_db, &mut transaction, booking).await;
            if let Some(remaining) =
                Self::finish(transaction, staged, "create_booking", attempt).await?
            {
                return Ok(remaining);
            }
        }

        Err(Self::exhausted("create_booking"))
    }

    async fn update_booking_status(
        &self,
        booking_id: &str,
        status: BookingStatus,
    ) -> Result<BookingChange, AppError> {
        let client = self.get_client()?;

        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            let (mut transaction, tx_db) = Self::begin(client).await?;
            let staged =
                Self::stage_status_change(client, &tx_db, &mut transaction, booking_id, status)
                    .await;
            if let Some(change) =
                Self::finish(transaction, staged, "update_booking_status", attempt).await?
            {
                return Ok(change);
            }
        }

        Err(Self::exhausted("update_booking_status"))
    }

    async fn delete_booking(&self, booking_id: &str) -> Result<BookingChange, AppError> {
        let client = self.get_client()?;

        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            let (mut transaction, tx_db) = Self::begin(client).await?;
            let staged =
                Self::stage_delete_booking(client, &tx_db, &mut transaction, booking_id).await;
            if let Some(change) =
                Self::finish(transaction, staged, "delete_booking", attempt).await?
            {
                return Ok(change);
            }
        }

        Err(Self::exhausted("delete_booking"))
    }
}
