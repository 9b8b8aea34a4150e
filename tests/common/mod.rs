// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request};
use std::sync::Arc;
use wildlife_tourism::config::Config;
use wildlife_tourism::db::{FirestoreDb, MemoryDb, Store};
use wildlife_tourism::middleware::auth::create_jwt;
use wildlife_tourism::middleware::Role;
use wildlife_tourism::models::{Activity, ActivityStatus};
use wildlife_tourism::routes::create_router;
use wildlife_tourism::AppState;

/// A date far enough ahead that it is never "in the past".
#[allow(dead_code)]
pub const FUTURE_DATE: &str = "2099-06-01";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a test app backed by in-memory storage.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::default();
    let db: Arc<dyn Store> = Arc::new(MemoryDb::new());
    let state = Arc::new(AppState::new(config, db));

    (create_router(state.clone()), state)
}

/// Session token for `user_id` signed with the test key.
#[allow(dead_code)]
pub fn token_for(state: &AppState, user_id: &str, role: Role) -> String {
    create_jwt(user_id, role, &state.config.jwt_signing_key).expect("Failed to create JWT")
}

/// Build a request carrying a bearer token and optional JSON body.
#[allow(dead_code)]
pub fn authed_request(
    method: &str,
    uri: &str,
    token: &str,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));

    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

/// An active activity with no bookings yet.
#[allow(dead_code)]
pub fn test_activity(id: &str, daily_slots: u32) -> Activity {
    let now = chrono::Utc::now().to_rfc3339();
    Activity {
        id: id.to_string(),
        name: format!("Activity {}", id),
        description: "Guided wildlife viewing".to_string(),
        location: Some("Reserve".to_string()),
        price_per_person: 25.0,
        daily_slots,
        available_slots: vec![],
        status: ActivityStatus::Active,
        created_at: now.clone(),
        updated_at: now,
    }
}

/// Store an activity directly, bypassing the admin route.
#[allow(dead_code)]
pub async fn seed_activity(state: &AppState, id: &str, daily_slots: u32) -> Activity {
    let activity = test_activity(id, daily_slots);
    state
        .db
        .upsert_activity(&activity)
        .await
        .expect("Failed to seed activity");
    activity
}
