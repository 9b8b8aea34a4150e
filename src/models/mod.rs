// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod booking;

pub use activity::{Activity, ActivityPatch, ActivityStatus, SlotOverride};
pub use booking::{ActivityBooking, BookingStatus};
