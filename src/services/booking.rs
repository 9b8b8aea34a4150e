// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity booking workflow.
//!
//! Handles:
//! 1. Request validation (before any storage access)
//! 2. Slot availability checks
//! 3. Booking creation with atomic slot reservation
//! 4. Status changes and deletion with slot restoration

use crate::db::{BookingChange, BookingFilter, RestoreOutcome, Store};
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Activity, ActivityBooking, ActivityStatus, BookingStatus};
use crate::time_utils::{now_rfc3339, parse_calendar_date};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// Upper bound on free-text special requests.
const MAX_SPECIAL_REQUESTS_LEN: u64 = 1000;

/// Booking creation request.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBooking {
    #[validate(length(min = 1, message = "activityId is required"))]
    pub activity_id: String,
    /// Defaults to the authenticated user. Only staff may book for others.
    pub user_id: Option<String>,
    #[validate(range(min = 1, message = "numberOfParticipants must be at least 1"))]
    pub number_of_participants: u32,
    #[validate(length(min = 1, message = "preferredDate is required"))]
    pub preferred_date: String,
    #[serde(default)]
    pub request_tour_guide: bool,
    #[validate(length(max = MAX_SPECIAL_REQUESTS_LEN))]
    pub special_requests: Option<String>,
}

/// Answer to "can this many people book on this date?".
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotCheck {
    pub can_book: bool,
    pub available_slots: u32,
    pub requested_participants: u32,
    pub message: String,
}

/// Booking workflow over a storage backend.
#[derive(Clone)]
pub struct BookingService {
    db: Arc<dyn Store>,
}

impl BookingService {
    pub fn new(db: Arc<dyn Store>) -> Self {
        Self { db }
    }

    async fn activity_or_not_found(&self, activity_id: &str) -> Result<Activity> {
        self.db
            .get_activity(activity_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", activity_id)))
    }

    async fn booking_for(&self, user: &AuthUser, booking_id: &str) -> Result<ActivityBooking> {
        let booking = self
            .db
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", booking_id)))?;

        if !user.can_access(&booking.user_id) {
            return Err(AppError::Forbidden(format!(
                "Booking {} belongs to another user",
                booking_id
            )));
        }

        Ok(booking)
    }

    /// Report whether `participants` people can book `activity_id` on `date`.
    pub async fn check_slots(
        &self,
        activity_id: &str,
        date: NaiveDate,
        participants: u32,
    ) -> Result<SlotCheck> {
        if participants == 0 {
            return Err(AppError::BadRequest(
                "participants must be at least 1".to_string(),
            ));
        }

        let activity = self.activity_or_not_found(activity_id).await?;
        let available = activity.slots_for_date(date);

        let (can_book, message) = if activity.status != ActivityStatus::Active {
            (
                false,
                "Activity is not currently available for booking".to_string(),
            )
        } else if available >= participants {
            (true, format!("{} slots available", available))
        } else {
            (
                false,
                format!(
                    "Only {} slots available, {} requested",
                    available, participants
                ),
            )
        };

        Ok(SlotCheck {
            can_book,
            available_slots: available,
            requested_participants: participants,
            message,
        })
    }

    /// Current slot count for a date, for post-booking verification.
    pub async fn verify_slots(&self, activity_id: &str, date: NaiveDate) -> Result<(Activity, u32)> {
        let activity = self.activity_or_not_found(activity_id).await?;
        let available = activity.slots_for_date(date);

        tracing::debug!(activity_id, %date, available, "Verified slot count");
        Ok((activity, available))
    }

    /// Validate and create a booking, reserving its slots.
    ///
    /// Returns the new booking and the slots left on its date.
    pub async fn create_booking(
        &self,
        user: &AuthUser,
        request: CreateBooking,
    ) -> Result<(ActivityBooking, u32)> {
        request.validate()?;

        let activity_id = request.activity_id.trim();
        if activity_id.is_empty() {
            return Err(AppError::BadRequest("activityId is required".to_string()));
        }

        let preferred_date = parse_calendar_date(&request.preferred_date)?;
        let today = Utc::now().date_naive();
        if preferred_date < today {
            return Err(AppError::BadRequest(format!(
                "preferredDate {} is in the past",
                preferred_date
            )));
        }

        let user_id = match request.user_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() && id != user.user_id => {
                if !user.is_staff() {
                    return Err(AppError::Forbidden(
                        "Cannot create bookings for another user".to_string(),
                    ));
                }
                id.to_string()
            }
            _ => user.user_id.clone(),
        };

        let activity = self.activity_or_not_found(activity_id).await?;

        let now = now_rfc3339();
        let booking = ActivityBooking {
            id: uuid::Uuid::new_v4().to_string(),
            activity_id: activity.id.clone(),
            activity_name: activity.name.clone(),
            user_id,
            number_of_participants: request.number_of_participants,
            preferred_date,
            status: BookingStatus::Pending,
            request_tour_guide: request.request_tour_guide,
            special_requests: request.special_requests,
            total_amount: activity.price_per_person * f64::from(request.number_of_participants),
            created_at: now.clone(),
            updated_at: now,
        };

        let remaining = self.db.create_booking(&booking).await?;

        tracing::info!(
            booking_id = %booking.id,
            activity_id = %booking.activity_id,
            user_id = %booking.user_id,
            date = %booking.preferred_date,
            participants = booking.number_of_participants,
            remaining,
            "Booking created"
        );

        Ok((booking, remaining))
    }

    pub async fn get_booking(&self, user: &AuthUser, booking_id: &str) -> Result<ActivityBooking> {
        self.booking_for(user, booking_id).await
    }

    /// List bookings visible to `user`. Tourists only ever see their own.
    pub async fn list_bookings(
        &self,
        user: &AuthUser,
        mut filter: BookingFilter,
    ) -> Result<Vec<ActivityBooking>> {
        if !user.is_staff() {
            filter.user_id = Some(user.user_id.clone());
        }
        self.db.list_bookings(&filter).await
    }

    /// Change a booking's status. Tourists may only cancel their own bookings.
    pub async fn update_status(
        &self,
        user: &AuthUser,
        booking_id: &str,
        status: BookingStatus,
    ) -> Result<BookingChange> {
        self.booking_for(user, booking_id).await?;

        if !user.is_staff() && status != BookingStatus::Cancelled {
            return Err(AppError::Forbidden(
                "Only staff can change booking status other than cancelling".to_string(),
            ));
        }

        let change = self.db.update_booking_status(booking_id, status).await?;
        log_change("Booking status updated", &change);
        Ok(change)
    }

    /// Hard-delete a booking, giving back its slots if it still held them.
    pub async fn delete_booking(&self, user: &AuthUser, booking_id: &str) -> Result<BookingChange> {
        self.booking_for(user, booking_id).await?;

        let change = self.db.delete_booking(booking_id).await?;
        log_change("Booking deleted", &change);
        Ok(change)
    }
}

fn log_change(message: &'static str, change: &BookingChange) {
    let booking = &change.booking;
    match change.restore {
        RestoreOutcome::ActivityMissing => tracing::warn!(
            booking_id = %booking.id,
            activity_id = %booking.activity_id,
            status = %booking.status,
            "{message}; activity missing so slots were not restored"
        ),
        RestoreOutcome::Restored { available_slots } => tracing::info!(
            booking_id = %booking.id,
            activity_id = %booking.activity_id,
            status = %booking.status,
            restored = booking.number_of_participants,
            available_slots,
            "{message}"
        ),
        RestoreOutcome::NotNeeded => tracing::info!(
            booking_id = %booking.id,
            status = %booking.status,
            "{message}"
        ),
    }
}
