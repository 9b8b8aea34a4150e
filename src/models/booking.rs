// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity booking model and status lifecycle.

use crate::error::AppError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Booking lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    Refunded,
}

impl BookingStatus {
    /// Whether a booking in this status still consumes activity slots.
    pub fn holds_slots(self) -> bool {
        !matches!(self, BookingStatus::Cancelled | BookingStatus::Refunded)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "in_progress" => Ok(BookingStatus::InProgress),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "refunded" => Ok(BookingStatus::Refunded),
            other => Err(AppError::BadRequest(format!(
                "Unknown booking status '{}'",
                other
            ))),
        }
    }
}

/// Stored activity booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityBooking {
    /// Booking ID (also used as document ID)
    pub id: String,
    pub activity_id: String,
    /// Activity name at booking time
    pub activity_name: String,
    pub user_id: String,
    /// Slots consumed on `preferred_date`
    pub number_of_participants: u32,
    pub preferred_date: NaiveDate,
    pub status: BookingStatus,
    #[serde(default)]
    pub request_tour_guide: bool,
    #[serde(default)]
    pub special_requests: Option<String>,
    pub total_amount: f64,
    pub created_at: String,
    pub updated_at: String,
}

impl ActivityBooking {
    /// Move the booking to `next`.
    ///
    /// Returns `true` if the change releases the booking's slots. Setting
    /// the current status again is a no-op, and a booking that has already
    /// given its slots back cannot be reopened.
    pub fn transition_to(&mut self, next: BookingStatus, now: &str) -> Result<bool, AppError> {
        if self.status == next {
            return Ok(false);
        }

        let was_holding = self.status.holds_slots();
        if !was_holding && next.holds_slots() {
            return Err(AppError::BadRequest(format!(
                "Booking {} is {} and cannot be moved back to {}",
                self.id, self.status, next
            )));
        }

        self.status = next;
        self.updated_at = now.to_string();

        Ok(was_holding && !next.holds_slots())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_booking(status: BookingStatus) -> ActivityBooking {
        ActivityBooking {
            id: "bk-1".to_string(),
            activity_id: "act-1".to_string(),
            activity_name: "Sunrise Safari".to_string(),
            user_id: "user-1".to_string(),
            number_of_participants: 4,
            preferred_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            status,
            request_tour_guide: false,
            special_requests: None,
            total_amount: 180.0,
            created_at: "2024-05-01T00:00:00Z".to_string(),
            updated_at: "2024-05-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_cancel_releases_slots() {
        let mut booking = make_booking(BookingStatus::Confirmed);

        let release = booking
            .transition_to(BookingStatus::Cancelled, "2024-05-02T00:00:00Z")
            .unwrap();

        assert!(release);
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(booking.updated_at, "2024-05-02T00:00:00Z");
    }

    #[test]
    fn test_repeated_cancel_is_noop() {
        let mut booking = make_booking(BookingStatus::Cancelled);

        let release = booking
            .transition_to(BookingStatus::Cancelled, "2024-05-02T00:00:00Z")
            .unwrap();

        assert!(!release);
        assert_eq!(booking.updated_at, "2024-05-01T00:00:00Z");
    }

    #[test]
    fn test_refund_after_cancel_does_not_release_again() {
        let mut booking = make_booking(BookingStatus::Cancelled);

        let release = booking
            .transition_to(BookingStatus::Refunded, "2024-05-03T00:00:00Z")
            .unwrap();

        assert!(!release);
        assert_eq!(booking.status, BookingStatus::Refunded);
    }

    #[test]
    fn test_cancelled_booking_cannot_reopen() {
        let mut booking = make_booking(BookingStatus::Cancelled);

        let err = booking
            .transition_to(BookingStatus::Confirmed, "2024-05-02T00:00:00Z")
            .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(booking.status, BookingStatus::Cancelled);
    }

    #[test]
    fn test_progress_keeps_slots() {
        let mut booking = make_booking(BookingStatus::Pending);

        assert!(!booking
            .transition_to(BookingStatus::Confirmed, "now")
            .unwrap());
        assert!(!booking
            .transition_to(BookingStatus::InProgress, "now")
            .unwrap());
        assert!(booking.status.holds_slots());
    }

    #[test]
    fn test_status_parse_round_trip() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::InProgress,
            BookingStatus::Completed,
            BookingStatus::Cancelled,
            BookingStatus::Refunded,
        ] {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert!("shipped".parse::<BookingStatus>().is_err());
    }
}
