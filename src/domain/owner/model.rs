//! EV owner profile entity

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    Active,
    Deactivated,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Deactivated => "Deactivated",
        }
    }

    pub fn is_active(&self) -> bool {
        *self == Self::Active
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Active" => Ok(Self::Active),
            "Deactivated" => Ok(Self::Deactivated),
            other => Err(DomainError::Validation(format!(
                "Invalid account status '{}'",
                other
            ))),
        }
    }
}

/// Profile linked 1:1 to an `EVOwner` user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    /// National identity card number, unique
    pub nic: String,
    pub full_name: String,
    pub phone: String,
    pub address: Option<String>,
    pub vehicle_model: Option<String>,
    pub license_plate: Option<String>,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OwnerProfile {
    pub fn new(
        user_id: Uuid,
        nic: impl Into<String>,
        full_name: impl Into<String>,
        phone: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            nic: nic.into(),
            full_name: full_name.into(),
            phone: phone.into(),
            address: None,
            vehicle_model: None,
            license_plate: None,
            status: AccountStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}
