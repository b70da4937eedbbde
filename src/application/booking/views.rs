//! Result types returned by the booking services

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::booking::{Booking, ChargingMode, TimeWindow};

/// Mutation result: the stored booking plus a message for the caller.
#[derive(Debug, Clone, Serialize)]
pub struct BookingOutcome {
    pub booking: Booking,
    pub message: String,
}

impl BookingOutcome {
    pub fn new(booking: Booking, message: impl Into<String>) -> Self {
        Self {
            booking,
            message: message.into(),
        }
    }
}

/// A booking joined with the owner and station it references.
#[derive(Debug, Clone, Serialize)]
pub struct BookingDetails {
    #[serde(flatten)]
    pub booking: Booking,
    pub owner_name: Option<String>,
    pub owner_nic: Option<String>,
    pub station_name: Option<String>,
    pub station_code: Option<String>,
    pub starts_at_local: DateTime<FixedOffset>,
    pub ends_at_local: DateTime<FixedOffset>,
}

/// What an operator sees when checking a driver in.
#[derive(Debug, Clone, Serialize)]
pub struct OperatorBookingView {
    #[serde(flatten)]
    pub details: BookingDetails,
    pub owner_phone: Option<String>,
    pub vehicle_model: Option<String>,
    pub license_plate: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotAvailability {
    pub station_id: Uuid,
    pub mode: ChargingMode,
    pub window: TimeWindow,
    pub available_slot_ids: Vec<String>,
    pub booked_slot_ids: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeBucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub local_start: DateTime<FixedOffset>,
    /// Active bookings starting exactly at `start`
    pub booked: u32,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayAvailability {
    pub station_id: Uuid,
    pub mode: ChargingMode,
    pub date: NaiveDate,
    pub capacity: u32,
    pub buckets: Vec<TimeBucket>,
}
