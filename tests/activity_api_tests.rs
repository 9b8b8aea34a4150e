// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity catalogue routes.

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;
use wildlife_tourism::middleware::Role;

mod common;
use common::{authed_request, create_test_app, json_body, seed_activity, token_for, FUTURE_DATE};

#[tokio::test]
async fn test_admin_creates_activity() {
    let (app, state) = create_test_app();
    let admin = token_for(&state, "admin-1", Role::Admin);

    let response = app
        .clone()
        .oneshot(authed_request(
            "POST",
            "/api/activities",
            &admin,
            Some(json!({
                "name": "  Sunrise Safari ",
                "description": "Early game drive",
                "pricePerPerson": 45.0,
                "dailySlots": 12,
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["name"], "Sunrise Safari");
    assert_eq!(body["dailySlots"], 12);
    assert_eq!(body["status"], "active");
    let id = body["id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(authed_request("GET", "/api/activities", &admin, None))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["activities"][0]["id"], id);
}

#[tokio::test]
async fn test_create_activity_validates_capacity() {
    let (app, state) = create_test_app();
    let admin = token_for(&state, "admin-1", Role::Admin);

    let response = app
        .oneshot(authed_request(
            "POST",
            "/api/activities",
            &admin,
            Some(json!({ "name": "Empty", "pricePerPerson": 5.0, "dailySlots": 0 })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_activity_with_date_reports_slots() {
    let (app, state) = create_test_app();
    seed_activity(&state, "safari", 10).await;
    let token = token_for(&state, "tourist-1", Role::Tourist);

    let response = app
        .clone()
        .oneshot(authed_request(
            "POST",
            "/api/activity-bookings",
            &token,
            Some(json!({
                "activityId": "safari",
                "numberOfParticipants": 3,
                "preferredDate": FUTURE_DATE,
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(authed_request(
            "GET",
            &format!("/api/activities/safari?date={}", FUTURE_DATE),
            &token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["availableSlots"], 7);
    assert_eq!(body["slotOverrides"][0]["date"], FUTURE_DATE);
    assert_eq!(body["slotOverrides"][0]["slots"], 7);

    // Another day is untouched
    let response = app
        .oneshot(authed_request(
            "GET",
            "/api/activities/safari?date=2099-06-02",
            &token,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["availableSlots"], 10);
}

#[tokio::test]
async fn test_update_keeps_booked_inventory() {
    let (app, state) = create_test_app();
    seed_activity(&state, "safari", 10).await;
    let admin = token_for(&state, "admin-1", Role::Admin);

    let response = app
        .clone()
        .oneshot(authed_request(
            "POST",
            "/api/activity-bookings",
            &admin,
            Some(json!({
                "activityId": "safari",
                "numberOfParticipants": 4,
                "preferredDate": FUTURE_DATE,
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(authed_request(
            "PUT",
            "/api/activities/safari",
            &admin,
            Some(json!({ "pricePerPerson": 60.0, "status": "inactive" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["pricePerPerson"], 60.0);
    assert_eq!(body["status"], "inactive");
    assert_eq!(body["slotOverrides"][0]["slots"], 6);
}

#[tokio::test]
async fn test_inactive_activity_rejects_bookings() {
    let (app, state) = create_test_app();
    let mut activity = common::test_activity("closed", 10);
    activity.status = wildlife_tourism::models::ActivityStatus::Inactive;
    state.db.upsert_activity(&activity).await.unwrap();
    let token = token_for(&state, "tourist-1", Role::Tourist);

    let response = app
        .oneshot(authed_request(
            "POST",
            "/api/activity-bookings",
            &token,
            Some(json!({
                "activityId": "closed",
                "numberOfParticipants": 1,
                "preferredDate": FUTURE_DATE,
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "activity_inactive");
}

#[tokio::test]
async fn test_delete_activity_with_active_bookings_conflicts() {
    let (app, state) = create_test_app();
    seed_activity(&state, "safari", 10).await;
    let admin = token_for(&state, "admin-1", Role::Admin);

    let response = app
        .clone()
        .oneshot(authed_request(
            "POST",
            "/api/activity-bookings",
            &admin,
            Some(json!({
                "activityId": "safari",
                "numberOfParticipants": 2,
                "preferredDate": FUTURE_DATE,
            })),
        ))
        .await
        .unwrap();
    let booking_id = json_body(response).await["booking"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(authed_request("DELETE", "/api/activities/safari", &admin, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Once the booking is cancelled the activity can go
    let response = app
        .clone()
        .oneshot(authed_request(
            "PUT",
            &format!("/api/activity-bookings/{}", booking_id),
            &admin,
            Some(json!({ "status": "cancelled" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(authed_request("DELETE", "/api/activities/safari", &admin, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(authed_request("GET", "/api/activities/safari", &admin, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
