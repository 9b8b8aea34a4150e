// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity booking routes.

use crate::db::{BookingChange, BookingFilter, RestoreOutcome};
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{ActivityBooking, BookingStatus};
use crate::services::{CreateBooking, SlotCheck};
use crate::time_utils::{format_calendar_date, parse_calendar_date};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Booking routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/activity-bookings",
            get(list_bookings).post(create_booking),
        )
        .route("/api/activity-bookings/check-slots", get(check_slots))
        .route("/api/activity-bookings/verify-slots", get(verify_slots))
        .route(
            "/api/activity-bookings/{id}",
            get(get_booking).put(update_booking).delete(delete_booking),
        )
}

// ─── Response Types ──────────────────────────────────────────

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BookingResponse {
    pub id: String,
    pub activity_id: String,
    pub activity_name: String,
    pub user_id: String,
    pub number_of_participants: u32,
    pub preferred_date: String,
    pub status: String,
    pub request_tour_guide: bool,
    pub special_requests: Option<String>,
    pub total_amount: f64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ActivityBooking> for BookingResponse {
    fn from(b: ActivityBooking) -> Self {
        Self {
            id: b.id,
            activity_id: b.activity_id,
            activity_name: b.activity_name,
            user_id: b.user_id,
            number_of_participants: b.number_of_participants,
            preferred_date: format_calendar_date(b.preferred_date),
            status: b.status.as_str().to_string(),
            request_tour_guide: b.request_tour_guide,
            special_requests: b.special_requests,
            total_amount: b.total_amount,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreateBookingResponse {
    pub booking: BookingResponse,
    pub remaining_slots: u32,
}

/// Result of a status change or deletion, including what happened to the
/// activity's slot inventory.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BookingChangeResponse {
    pub booking: BookingResponse,
    /// "not_needed", "restored" or "activity_missing"
    pub slot_restore: String,
    pub available_slots: Option<u32>,
}

impl From<BookingChange> for BookingChangeResponse {
    fn from(change: BookingChange) -> Self {
        let (slot_restore, available_slots) = match change.restore {
            RestoreOutcome::NotNeeded => ("not_needed", None),
            RestoreOutcome::Restored { available_slots } => ("restored", Some(available_slots)),
            RestoreOutcome::ActivityMissing => ("activity_missing", None),
        };
        Self {
            booking: change.booking.into(),
            slot_restore: slot_restore.to_string(),
            available_slots,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct VerifySlotsResponse {
    pub activity_id: String,
    pub date: String,
    pub available_slots: u32,
    pub daily_slots: u32,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BookingsResponse {
    pub bookings: Vec<BookingResponse>,
    pub total: usize,
}

// ─── Slot Availability ───────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SlotsQuery {
    activity_id: Option<String>,
    date: Option<String>,
    participants: Option<u32>,
}

impl SlotsQuery {
    fn required(&self) -> Result<(&str, chrono::NaiveDate)> {
        let activity_id = self
            .activity_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::BadRequest("activityId is required".to_string()))?;
        let date = self
            .date
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("date is required".to_string()))?;
        Ok((activity_id, parse_calendar_date(date)?))
    }
}

/// Check whether a group can book an activity on a date.
async fn check_slots(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SlotsQuery>,
) -> Result<Json<SlotCheck>> {
    let (activity_id, date) = params.required()?;
    let participants = params
        .participants
        .ok_or_else(|| AppError::BadRequest("participants is required".to_string()))?;

    let check = state
        .bookings
        .check_slots(activity_id, date, participants)
        .await?;
    Ok(Json(check))
}

/// Report the stored slot count for a date.
async fn verify_slots(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SlotsQuery>,
) -> Result<Json<VerifySlotsResponse>> {
    let (activity_id, date) = params.required()?;

    let (activity, available_slots) = state.bookings.verify_slots(activity_id, date).await?;
    Ok(Json(VerifySlotsResponse {
        activity_id: activity.id,
        date: format_calendar_date(date),
        available_slots,
        daily_slots: activity.daily_slots,
    }))
}

// ─── Bookings ────────────────────────────────────────────────

async fn create_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateBooking>,
) -> Result<(StatusCode, Json<CreateBookingResponse>)> {
    let (booking, remaining_slots) = state.bookings.create_booking(&user, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateBookingResponse {
            booking: booking.into(),
            remaining_slots,
        }),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookingsQuery {
    activity_id: Option<String>,
    status: Option<String>,
}

async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<BookingsQuery>,
) -> Result<Json<BookingsResponse>> {
    let filter = BookingFilter {
        user_id: None,
        activity_id: params.activity_id,
        status: params
            .status
            .as_deref()
            .map(str::parse::<BookingStatus>)
            .transpose()?,
    };

    tracing::debug!(
        user_id = %user.user_id,
        activity_id = ?filter.activity_id,
        status = ?filter.status,
        "Listing bookings"
    );

    let bookings: Vec<BookingResponse> = state
        .bookings
        .list_bookings(&user, filter)
        .await?
        .into_iter()
        .map(BookingResponse::from)
        .collect();

    Ok(Json(BookingsResponse {
        total: bookings.len(),
        bookings,
    }))
}

async fn get_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(booking_id): Path<String>,
) -> Result<Json<BookingResponse>> {
    let booking = state.bookings.get_booking(&user, &booking_id).await?;
    Ok(Json(booking.into()))
}

#[derive(Deserialize)]
struct UpdateBookingRequest {
    status: String,
}

/// Change a booking's status. Cancelling gives its slots back.
async fn update_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(booking_id): Path<String>,
    Json(request): Json<UpdateBookingRequest>,
) -> Result<Json<BookingChangeResponse>> {
    let status: BookingStatus = request.status.trim().parse()?;

    let change = state
        .bookings
        .update_status(&user, &booking_id, status)
        .await?;
    Ok(Json(change.into()))
}

async fn delete_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(booking_id): Path<String>,
) -> Result<Json<BookingChangeResponse>> {
    let change = state.bookings.delete_booking(&user, &booking_id).await?;
    Ok(Json(change.into()))
}
