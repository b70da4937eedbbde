//! Charging station domain entity

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::inventory::generate_slot_ids;
use crate::domain::booking::ChargingMode;
use crate::shared::DomainError;

/// Station lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StationStatus {
    Active,
    Deactivated,
    UnderMaintenance,
}

impl StationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Deactivated => "Deactivated",
            Self::UnderMaintenance => "UnderMaintenance",
        }
    }
}

impl Default for StationStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl fmt::Display for StationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Active" => Ok(Self::Active),
            "Deactivated" => Ok(Self::Deactivated),
            "UnderMaintenance" => Ok(Self::UnderMaintenance),
            other => Err(DomainError::Validation(format!(
                "Invalid station status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Charging station with per-mode slot inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub ac_slot_count: u32,
    pub dc_slot_count: u32,
    /// Always `A1..=A{ac_slot_count}`
    pub ac_slots: Vec<String>,
    /// Always `D1..=D{dc_slot_count}`
    pub dc_slots: Vec<String>,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub location: GeoPoint,
    pub notes: Option<String>,
    pub status: StationStatus,
    /// Users (StationOperator role) assigned to this station
    pub operator_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Station {
    pub fn new(
        name: impl Into<String>,
        code: impl Into<String>,
        ac_slot_count: u32,
        dc_slot_count: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            code: code.into(),
            ac_slot_count,
            dc_slot_count,
            ac_slots: generate_slot_ids(ChargingMode::Ac, ac_slot_count),
            dc_slots: generate_slot_ids(ChargingMode::Dc, dc_slot_count),
            address_line1: String::new(),
            address_line2: None,
            city: String::new(),
            location: GeoPoint::default(),
            notes: None,
            status: StationStatus::Active,
            operator_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == StationStatus::Active
    }

    pub fn slots_for(&self, mode: ChargingMode) -> &[String] {
        match mode {
            ChargingMode::Ac => &self.ac_slots,
            ChargingMode::Dc => &self.dc_slots,
        }
    }

    pub fn capacity_for(&self, mode: ChargingMode) -> u32 {
        match mode {
            ChargingMode::Ac => self.ac_slot_count,
            ChargingMode::Dc => self.dc_slot_count,
        }
    }

    pub fn total_slots(&self) -> u32 {
        self.ac_slot_count + self.dc_slot_count
    }

    pub fn has_slot(&self, mode: ChargingMode, slot_id: &str) -> bool {
        self.slots_for(mode).iter().any(|s| s == slot_id)
    }

    /// Set the slot count for `mode` and regenerate its identifier list.
    pub fn set_slot_count(&mut self, mode: ChargingMode, count: u32) {
        match mode {
            ChargingMode::Ac => {
                self.ac_slot_count = count;
                self.ac_slots = generate_slot_ids(mode, count);
            }
            ChargingMode::Dc => {
                self.dc_slot_count = count;
                self.dc_slots = generate_slot_ids(mode, count);
            }
        }
    }

    pub fn has_operator(&self, user_id: Uuid) -> bool {
        self.operator_ids.contains(&user_id)
    }
}
