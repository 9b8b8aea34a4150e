// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request timeout tests.
//!
//! A store that stalls must not hold a request open past the configured
//! timeout; the client gets 408 instead.

use async_trait::async_trait;
use axum::http::StatusCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;
use wildlife_tourism::config::Config;
use wildlife_tourism::db::{BookingChange, BookingFilter, MemoryDb, Store};
use wildlife_tourism::error::AppError;
use wildlife_tourism::middleware::Role;
use wildlife_tourism::models::{Activity, ActivityBooking, ActivityPatch, BookingStatus};
use wildlife_tourism::routes::create_router;
use wildlife_tourism::AppState;

mod common;
use common::{authed_request, token_for};

const STALL: Duration = Duration::from_secs(30);

/// Memory store whose activity listing never finishes in time.
struct StalledStore {
    inner: MemoryDb,
}

#[async_trait]
impl Store for StalledStore {
    async fn get_activity(&self, activity_id: &str) -> Result<Option<Activity>, AppError> {
        self.inner.get_activity(activity_id).await
    }

    async fn list_activities(&self) -> Result<Vec<Activity>, AppError> {
        tokio::time::sleep(STALL).await;
        self.inner.list_activities().await
    }

    async fn upsert_activity(&self, activity: &Activity) -> Result<(), AppError> {
        self.inner.upsert_activity(activity).await
    }

    async fn update_activity(
        &self,
        activity_id: &str,
        patch: &ActivityPatch,
    ) -> Result<Activity, AppError> {
        self.inner.update_activity(activity_id, patch).await
    }

    async fn delete_activity(&self, activity_id: &str) -> Result<(), AppError> {
        self.inner.delete_activity(activity_id).await
    }

    async fn get_booking(&self, booking_id: &str) -> Result<Option<ActivityBooking>, AppError> {
        self.inner.get_booking(booking_id).await
    }

    async fn list_bookings(
        &self,
        filter: &BookingFilter,
    ) -> Result<Vec<ActivityBooking>, AppError> {
        self.inner.list_bookings(filter).await
    }

    async fn create_booking(&self, booking: &ActivityBooking) -> Result<u32, AppError> {
        self.inner.create_booking(booking).await
    }

    async fn update_booking_status(
        &self,
        booking_id: &str,
        status: BookingStatus,
    ) -> Result<BookingChange, AppError> {
        self.inner.update_booking_status(booking_id, status).await
    }

    async fn delete_booking(&self, booking_id: &str) -> Result<BookingChange, AppError> {
        self.inner.delete_booking(booking_id).await
    }
}

#[tokio::test]
async fn test_stalled_request_times_out() {
    let config = Config {
        request_timeout_secs: 1,
        ..Config::default()
    };
    let db: Arc<dyn Store> = Arc::new(StalledStore {
        inner: MemoryDb::new(),
    });
    let state = Arc::new(AppState::new(config, db));
    let app = create_router(state.clone());
    let token = token_for(&state, "tourist-1", Role::Tourist);

    let started = Instant::now();
    let response = app
        .clone()
        .oneshot(authed_request("GET", "/api/activities", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert!(started.elapsed() < STALL);

    // Routes that do not stall are unaffected
    let response = app
        .oneshot(authed_request("GET", "/api/activity-bookings", &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
