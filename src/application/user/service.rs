//! Operational users and authentication
//!
//! Backoffice staff and station operators are created here. EV owners come
//! in through the owner registration flow instead.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::application::access::require_backoffice;
use crate::application::station::{OperatorAssignment, StationService};
use crate::domain::{Caller, RepositoryProvider, User, UserRole};
use crate::infrastructure::crypto::{hash_password, verify_password};
use crate::shared::{detached, DomainError, DomainResult, SharedClock};

const BAD_CREDENTIALS: &str = "Invalid email or password.";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "A valid email is required."))]
    pub email: String,
    #[validate(length(min = 1, max = 120, message = "Full name is required."))]
    pub full_name: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters."))]
    pub password: String,
    pub role: UserRole,
    /// Operators only
    pub station_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserOutcome {
    pub user: User,
    pub message: String,
}

/// Result of a successful login
#[derive(Debug, Clone, Serialize)]
pub struct AuthResult {
    pub user: User,
    #[serde(skip)]
    pub caller: Caller,
    pub assigned_station_name: Option<String>,
}

pub struct UserService {
    repos: Arc<dyn RepositoryProvider>,
    stations: Arc<StationService>,
    clock: SharedClock,
}

impl UserService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        stations: Arc<StationService>,
        clock: SharedClock,
    ) -> Self {
        Self {
            repos,
            stations,
            clock,
        }
    }

    // ── Authentication ──────────────────────────────────────────

    pub async fn authenticate(&self, email: &str, password: &str) -> DomainResult<AuthResult> {
        let Some(user) = self.repos.users().find_by_email(email.trim()).await? else {
            return Err(DomainError::Unauthorized(BAD_CREDENTIALS.into()));
        };
        if !verify_password(password, &user.password_hash) {
            return Err(DomainError::Unauthorized(BAD_CREDENTIALS.into()));
        }
        if !user.is_active {
            return Err(DomainError::Unauthorized("Account is deactivated.".into()));
        }

        let assigned_station_name = match user.assigned_station_id {
            Some(id) if user.role == UserRole::StationOperator => self
                .repos
                .stations()
                .find_by_id(id)
                .await?
                .map(|s| s.name),
            _ => None,
        };

        info!(user_id = %user.id, role = %user.role, "User authenticated");
        Ok(AuthResult {
            caller: Caller::new(user.id, user.role),
            user,
            assigned_station_name,
        })
    }

    // ── Commands ────────────────────────────────────────────────

    /// Create a Backoffice user or a station operator, optionally assigned
    /// to a station right away. A failed assignment removes the new user.
    pub async fn create_operational_user(
        &self,
        caller: &Caller,
        request: CreateUserRequest,
    ) -> DomainResult<UserOutcome> {
        require_backoffice(caller, "create staff accounts")?;
        request.validate()?;
        if !request.role.is_staff() {
            return Err(DomainError::Validation(
                "EV owner accounts are created through owner registration.".into(),
            ));
        }
        if request.station_id.is_some() && request.role != UserRole::StationOperator {
            return Err(DomainError::Validation(
                "Only station operators can be assigned to a station.".into(),
            ));
        }
        if self
            .repos
            .users()
            .find_by_email(&request.email)
            .await?
            .is_some()
        {
            return Err(DomainError::Conflict("Email is already registered.".into()));
        }

        let mut user = User::new(
            request.email.trim().to_lowercase(),
            request.full_name,
            hash_password(&request.password)?,
            request.role,
            self.clock.now(),
        );
        if let Some(station_id) = request.station_id {
            let repos = self.repos.clone();
            let stations = self.stations.clone();
            let caller = *caller;
            let created = user.clone();
            detached(async move {
                write_assigned_user(repos, stations, caller, created, station_id).await
            })
            .await?;
            user.assigned_station_id = Some(station_id);
        } else {
            self.repos.users().insert(user.clone()).await?;
        }

        info!(user_id = %user.id, role = %user.role, "Staff account created");
        Ok(UserOutcome {
            user,
            message: "User created successfully.".into(),
        })
    }

    /// Create the configured Backoffice account when the user table is
    /// empty. Returns whether an account was created.
    pub async fn ensure_bootstrap_admin(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> DomainResult<bool> {
        if self.repos.users().count().await? > 0 {
            return Ok(false);
        }
        let admin = User::new(
            email.trim().to_lowercase(),
            full_name,
            hash_password(password)?,
            UserRole::Backoffice,
            self.clock.now(),
        );
        self.repos.users().insert(admin).await?;
        info!("Default admin created: {}", email);
        warn!("⚠️  Please change the admin password immediately!");
        Ok(true)
    }

    // ── Queries ─────────────────────────────────────────────────

    /// Backoffice users and station operators, newest first
    pub async fn list_operational_users(&self, caller: &Caller) -> DomainResult<Vec<User>> {
        require_backoffice(caller, "list staff accounts")?;
        let mut users = self.repos.users().find_by_role(UserRole::Backoffice).await?;
        users.extend(
            self.repos
                .users()
                .find_by_role(UserRole::StationOperator)
                .await?,
        );
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }
}

/// Insert the user, then assign it; a failed assignment removes the user.
async fn write_assigned_user(
    repos: Arc<dyn RepositoryProvider>,
    stations: Arc<StationService>,
    caller: Caller,
    user: User,
    station_id: Uuid,
) -> DomainResult<()> {
    repos.users().insert(user.clone()).await?;
    let assigned = stations
        .assign_operators(&caller, station_id, vec![user.id], OperatorAssignment::Append)
        .await;
    if let Err(e) = assigned {
        warn!(user_id = %user.id, error = %e, "Station assignment failed, removing user");
        if let Err(cleanup) = repos.users().delete(user.id).await {
            warn!(
                user_id = %user.id,
                error = %cleanup,
                integrity = true,
                "Unassigned operator left behind"
            );
        }
        return Err(e);
    }
    Ok(())
}
