// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity catalogue routes. Reads are open to any signed-in user; writes
//! are admin-only.

use crate::error::{AppError, Result};
use crate::middleware::auth::{AuthUser, Role};
use crate::models::{Activity, ActivityPatch, ActivityStatus};
use crate::time_utils::{format_calendar_date, now_rfc3339, parse_calendar_date};
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
use validator::Validate;

const MAX_NAME_LEN: u64 = 200;
const MAX_DESCRIPTION_LEN: u64 = 5000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/activities", get(list_activities).post(create_activity))
        .route(
            "/api/activities/{id}",
            get(get_activity)
                .put(update_activity)
                .delete(delete_activity),
        )
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SlotOverrideResponse {
    pub date: String,
    pub slots: u32,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActivityResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub location: Option<String>,
    pub price_per_person: f64,
    pub daily_slots: u32,
    pub status: String,
    /// Dates that have bookings, with their remaining slots
    pub slot_overrides: Vec<SlotOverrideResponse>,
    /// Remaining slots on the requested date, if one was given
    pub available_slots: Option<u32>,
    pub created_at: String,
    pub updated_at: String,
}

impl ActivityResponse {
    fn new(activity: Activity, available_slots: Option<u32>) -> Self {
        Self {
            id: activity.id,
            name: activity.name,
            description: activity.description,
            location: activity.location,
            price_per_person: activity.price_per_person,
            daily_slots: activity.daily_slots,
            status: activity.status.as_str().to_string(),
            slot_overrides: activity
                .available_slots
                .into_iter()
                .map(|o| SlotOverrideResponse {
                    date: format_calendar_date(o.date),
                    slots: o.slots,
                })
                .collect(),
            available_slots,
            created_at: activity.created_at,
            updated_at: activity.updated_at,
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActivitiesResponse {
    pub activities: Vec<ActivityResponse>,
    pub total: usize,
}

async fn list_activities(State(state): State<Arc<AppState>>) -> Result<Json<ActivitiesResponse>> {
    let activities: Vec<ActivityResponse> = state
        .db
        .list_activities()
        .await?
        .into_iter()
        .map(|a| ActivityResponse::new(a, None))
        .collect();

    Ok(Json(ActivitiesResponse {
        total: activities.len(),
        activities,
    }))
}

#[derive(Deserialize)]
struct ActivityQuery {
    /// Include remaining slots for this calendar day
    date: Option<String>,
}

async fn get_activity(
    State(state): State<Arc<AppState>>,
    Path(activity_id): Path<String>,
    Query(params): Query<ActivityQuery>,
) -> Result<Json<ActivityResponse>> {
    let date = params
        .date
        .as_deref()
        .map(parse_calendar_date)
        .transpose()?;

    let activity = state
        .db
        .get_activity(&activity_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", activity_id)))?;

    let available = date.map(|d| activity.slots_for_date(d));
    Ok(Json(ActivityResponse::new(activity, available)))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateActivityRequest {
    #[validate(length(min = 1, max = MAX_NAME_LEN))]
    name: String,
    #[serde(default)]
    #[validate(length(max = MAX_DESCRIPTION_LEN))]
    description: String,
    location: Option<String>,
    #[validate(range(min = 0.0))]
    price_per_person: f64,
    #[validate(range(min = 1))]
    daily_slots: u32,
    #[serde(default)]
    status: ActivityStatus,
}

async fn create_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateActivityRequest>,
) -> Result<(StatusCode, Json<ActivityResponse>)> {
    user.require_role(Role::Admin)?;
    request.validate()?;

    let now = now_rfc3339();
    let activity = Activity {
        id: uuid::Uuid::new_v4().to_string(),
        name: request.name.trim().to_string(),
        description: request.description,
        location: request.location,
        price_per_person: request.price_per_person,
        daily_slots: request.daily_slots,
        available_slots: vec![],
        status: request.status,
        created_at: now.clone(),
        updated_at: now,
    };

    state.db.upsert_activity(&activity).await?;

    tracing::info!(
        activity_id = %activity.id,
        name = %activity.name,
        daily_slots = activity.daily_slots,
        admin = %user.user_id,
        "Activity created"
    );

    Ok((StatusCode::CREATED, Json(ActivityResponse::new(activity, None))))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct UpdateActivityRequest {
    #[validate(length(min = 1, max = MAX_NAME_LEN))]
    name: Option<String>,
    #[validate(length(max = MAX_DESCRIPTION_LEN))]
    description: Option<String>,
    location: Option<String>,
    #[validate(range(min = 0.0))]
    price_per_person: Option<f64>,
    #[validate(range(min = 1))]
    daily_slots: Option<u32>,
    status: Option<ActivityStatus>,
}

/// Partial update. Existing per-date slot counts are left as they are.
async fn update_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<String>,
    Json(request): Json<UpdateActivityRequest>,
) -> Result<Json<ActivityResponse>> {
    user.require_role(Role::Admin)?;
    request.validate()?;

    let patch = ActivityPatch {
        name: request.name.map(|n| n.trim().to_string()),
        description: request.description,
        location: request.location,
        price_per_person: request.price_per_person,
        daily_slots: request.daily_slots,
        status: request.status,
    };

    let activity = state.db.update_activity(&activity_id, &patch).await?;

    tracing::info!(activity_id = %activity.id, admin = %user.user_id, "Activity updated");
    Ok(Json(ActivityResponse::new(activity, None)))
}

async fn delete_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(activity_id): Path<String>,
) -> Result<StatusCode> {
    user.require_role(Role::Admin)?;

    state.db.delete_activity(&activity_id).await?;

    tracing::info!(activity_id = %activity_id, admin = %user.user_id, "Activity deleted");
    Ok(StatusCode::NO_CONTENT)
}
