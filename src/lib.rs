// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Wildlife tourism bookings: activities with daily capacity and the
//! bookings that consume it.
//!
//! This crate provides the backend API for browsing activities, checking
//! per-date availability, and creating, cancelling and deleting bookings
//! without ever overbooking a day.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Store;
use services::BookingService;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Arc<dyn Store>,
    pub bookings: BookingService,
}

impl AppState {
    pub fn new(config: Config, db: Arc<dyn Store>) -> Self {
        let bookings = BookingService::new(db.clone());
        Self {
            config,
            db,
            bookings,
        }
    }
}
