//! Booking domain entity

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::{DomainError, DomainResult};

/// Charging current type. Each mode has its own slot pool at a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChargingMode {
    #[serde(rename = "AC")]
    Ac,
    #[serde(rename = "DC")]
    Dc,
}

impl ChargingMode {
    pub const ALL: [ChargingMode; 2] = [ChargingMode::Ac, ChargingMode::Dc];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ac => "AC",
            Self::Dc => "DC",
        }
    }

    /// Prefix of the slot identifiers generated for this mode (`A1`, `D1`).
    pub fn slot_prefix(&self) -> char {
        match self {
            Self::Ac => 'A',
            Self::Dc => 'D',
        }
    }
}

impl fmt::Display for ChargingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChargingMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AC" => Ok(Self::Ac),
            "DC" => Ok(Self::Dc),
            other => Err(DomainError::Validation(format!(
                "Invalid charging mode '{}'. Expected AC or DC.",
                other
            ))),
        }
    }
}

/// Booking lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    /// Requested by an EV owner, waiting for staff approval
    Pending,
    /// Approved by staff, QR issued
    Approved,
    /// Withdrawn by owner or staff (terminal)
    Canceled,
    /// Charging session finalized by an operator (terminal)
    Completed,
}

impl BookingStatus {
    /// Statuses that hold a slot.
    pub const ACTIVE: [BookingStatus; 2] = [BookingStatus::Pending, BookingStatus::Approved];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Canceled => "Canceled",
            Self::Completed => "Completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Canceled | Self::Completed)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = DomainError;

    /// Accepts the legacy `Cancelled` spelling and maps it onto `Canceled`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Pending" => Ok(Self::Pending),
            "Approved" => Ok(Self::Approved),
            "Canceled" | "Cancelled" => Ok(Self::Canceled),
            "Completed" => Ok(Self::Completed),
            other => Err(DomainError::Validation(format!(
                "Invalid booking status '{}'",
                other
            ))),
        }
    }
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> DomainResult<Self> {
        if end <= start {
            return Err(DomainError::Validation(
                "End time must be after start time.".into(),
            ));
        }
        Ok(Self { start, end })
    }

    /// Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Charging slot booking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    /// User id of the EV owner the booking is for
    pub owner_id: Uuid,
    pub station_id: Uuid,
    pub mode: ChargingMode,
    /// Slot identifier from the station inventory for `mode` (e.g. `A1`)
    pub slot_id: String,
    pub window: TimeWindow,
    pub status: BookingStatus,
    /// Base64 PNG encoding the booking id; set while Approved
    pub qr_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        owner_id: Uuid,
        station_id: Uuid,
        mode: ChargingMode,
        slot_id: impl Into<String>,
        window: TimeWindow,
        status: BookingStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            station_id,
            mode,
            slot_id: slot_id.into(),
            window,
            status,
            qr_code: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Same stored revision: status, placement and last write all match.
    pub fn same_revision(&self, other: &Booking) -> bool {
        self.status == other.status
            && self.station_id == other.station_id
            && self.mode == other.mode
            && self.slot_id == other.slot_id
            && self.window == other.window
            && self.updated_at == other.updated_at
    }

    /// Time left before the session starts; negative once started.
    pub fn time_until_start(&self, now: DateTime<Utc>) -> Duration {
        self.window.start - now
    }
}

// ── Tests ──────────────────────────────────────────────────────
