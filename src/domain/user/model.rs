use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::DomainError;

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserRole {
    EVOwner,
    StationOperator,
    Backoffice,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EVOwner => "EVOwner",
            Self::StationOperator => "StationOperator",
            Self::Backoffice => "Backoffice",
        }
    }

    /// Backoffice and station operators
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::StationOperator | Self::Backoffice)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "EVOwner" => Ok(Self::EVOwner),
            "StationOperator" => Ok(Self::StationOperator),
            "Backoffice" => Ok(Self::Backoffice),
            other => Err(DomainError::Validation(format!("Invalid role '{}'", other))),
        }
    }
}

/// User account
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub is_active: bool,
    /// Station an operator works at (one at most)
    pub assigned_station_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        email: impl Into<String>,
        full_name: impl Into<String>,
        password_hash: impl Into<String>,
        role: UserRole,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            full_name: full_name.into(),
            password_hash: password_hash.into(),
            role,
            is_active: true,
            assigned_station_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Identity of whoever is calling a service, resolved upstream from a
/// bearer credential. Services trust it as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: UserRole,
}

impl Caller {
    pub fn new(user_id: Uuid, role: UserRole) -> Self {
        Self { user_id, role }
    }

    pub fn owner(user_id: Uuid) -> Self {
        Self::new(user_id, UserRole::EVOwner)
    }

    pub fn operator(user_id: Uuid) -> Self {
        Self::new(user_id, UserRole::StationOperator)
    }

    pub fn backoffice(user_id: Uuid) -> Self {
        Self::new(user_id, UserRole::Backoffice)
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    pub fn is_backoffice(&self) -> bool {
        self.role == UserRole::Backoffice
    }
}
