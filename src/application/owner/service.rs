//! EV owner accounts
//!
//! An owner is two records: a `User` (credentials, role, active flag) and an
//! `OwnerProfile` (NIC, contact and vehicle details). The store has no
//! multi-document transaction, so every flow that writes both undoes its
//! first write when the second one fails. Those write phases run detached
//! from the request, so a caller going away cannot stop them half way.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::application::access::require_backoffice;
use crate::application::ports::NotificationSender;
use crate::domain::{
    AccountStatus, Caller, OwnerProfile, RepositoryProvider, User, UserRole,
};
use crate::infrastructure::crypto::{generate_temporary_password, hash_password};
use crate::shared::{detached, DomainError, DomainResult, SharedClock};

const PROFILE_DENIED: &str = "You are not authorized to modify this profile.";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterOwnerRequest {
    #[validate(email(message = "A valid email is required."))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters."))]
    pub password: String,
    pub nic: String,
    #[validate(length(min = 1, max = 120, message = "Full name is required."))]
    pub full_name: String,
    #[validate(length(min = 7, max = 20, message = "A valid phone number is required."))]
    pub phone: String,
    pub address: Option<String>,
    pub vehicle_model: Option<String>,
    pub license_plate: Option<String>,
}

/// Owner account opened by staff; the password is generated and mailed.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOwnerRequest {
    #[validate(email(message = "A valid email is required."))]
    pub email: String,
    pub nic: String,
    #[validate(length(min = 1, max = 120, message = "Full name is required."))]
    pub full_name: String,
    #[validate(length(min = 7, max = 20, message = "A valid phone number is required."))]
    pub phone: String,
    pub address: Option<String>,
    pub vehicle_model: Option<String>,
    pub license_plate: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateOwnerRequest {
    /// Accepted only when equal to the stored NIC
    pub nic: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub full_name: Option<String>,
    #[validate(length(min = 7, max = 20))]
    pub phone: Option<String>,
    pub address: Option<String>,
    pub vehicle_model: Option<String>,
    pub license_plate: Option<String>,
}

/// Profile joined with its account.
#[derive(Debug, Clone, Serialize)]
pub struct OwnerDetails {
    #[serde(flatten)]
    pub profile: OwnerProfile,
    pub email: String,
    pub is_active: bool,
}

impl OwnerDetails {
    fn new(profile: OwnerProfile, user: &User) -> Self {
        Self {
            profile,
            email: user.email.clone(),
            is_active: user.is_active,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OwnerOutcome {
    pub owner: OwnerDetails,
    pub message: String,
}

struct NewOwner {
    email: String,
    password_hash: String,
    nic: String,
    full_name: String,
    phone: String,
    address: Option<String>,
    vehicle_model: Option<String>,
    license_plate: Option<String>,
}

pub struct OwnerService {
    repos: Arc<dyn RepositoryProvider>,
    notifier: Arc<dyn NotificationSender>,
    clock: SharedClock,
}

impl OwnerService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        notifier: Arc<dyn NotificationSender>,
        clock: SharedClock,
    ) -> Self {
        Self {
            repos,
            notifier,
            clock,
        }
    }

    // ── Registration ────────────────────────────────────────────

    /// Self-service sign-up of an EV owner.
    pub async fn register(&self, request: RegisterOwnerRequest) -> DomainResult<OwnerOutcome> {
        request.validate()?;
        let owner = self
            .open_account(NewOwner {
                email: request.email,
                password_hash: hash_password(&request.password)?,
                nic: normalize_nic(&request.nic)?,
                full_name: request.full_name,
                phone: request.phone,
                address: request.address,
                vehicle_model: request.vehicle_model,
                license_plate: request.license_plate,
            })
            .await?;
        Ok(OwnerOutcome {
            owner,
            message: "Registration successful.".into(),
        })
    }

    /// Staff open an owner account; the generated password goes out by
    /// notification. A failed notification does not undo the account.
    pub async fn create_by_staff(
        &self,
        caller: &Caller,
        request: CreateOwnerRequest,
    ) -> DomainResult<OwnerOutcome> {
        if !caller.is_staff() {
            return Err(DomainError::Forbidden(
                "Only staff can create owner accounts.".into(),
            ));
        }
        request.validate()?;

        let password = generate_temporary_password();
        let owner = self
            .open_account(NewOwner {
                email: request.email,
                password_hash: hash_password(&password)?,
                nic: normalize_nic(&request.nic)?,
                full_name: request.full_name,
                phone: request.phone,
                address: request.address,
                vehicle_model: request.vehicle_model,
                license_plate: request.license_plate,
            })
            .await?;

        let message = match self
            .notifier
            .send_temporary_password(&owner.email, &password)
            .await
        {
            Ok(()) => "EV owner account created. A temporary password was sent by email.",
            Err(e) => {
                warn!(user_id = %owner.profile.user_id, error = %e, "Temporary password delivery failed");
                "EV owner account created, but the temporary password could not be sent."
            }
        };
        Ok(OwnerOutcome {
            owner,
            message: message.into(),
        })
    }

    async fn open_account(&self, new: NewOwner) -> DomainResult<OwnerDetails> {
        if self.repos.users().find_by_email(&new.email).await?.is_some() {
            return Err(DomainError::Conflict("Email is already registered.".into()));
        }
        if self.repos.owners().find_by_nic(&new.nic).await?.is_some() {
            return Err(DomainError::Conflict("NIC is already registered.".into()));
        }

        let now = self.clock.now();
        let user = User::new(
            new.email.trim().to_lowercase(),
            new.full_name.clone(),
            new.password_hash,
            UserRole::EVOwner,
            now,
        );
        let mut profile = OwnerProfile::new(user.id, new.nic, new.full_name, new.phone, now);
        profile.address = new.address;
        profile.vehicle_model = new.vehicle_model;
        profile.license_plate = new.license_plate;

        detached(write_account(self.repos.clone(), user.clone(), profile.clone())).await?;

        info!(user_id = %user.id, "EV owner registered");
        Ok(OwnerDetails::new(profile, &user))
    }

    // ── Queries ─────────────────────────────────────────────────

    /// Staff may look up anyone; an owner only themself.
    pub async fn get_by_nic(&self, caller: &Caller, nic: &str) -> DomainResult<OwnerDetails> {
        let nic = nic.trim().to_uppercase();
        let found = self.load(&nic).await;
        if caller.is_staff() {
            return found;
        }
        match found {
            Ok(owner) if owner.profile.user_id == caller.user_id => Ok(owner),
            Ok(_) | Err(DomainError::NotFound { .. }) => Err(DomainError::Forbidden(
                "You are not authorized to view this profile.".into(),
            )),
            Err(e) => Err(e),
        }
    }

    pub async fn list(&self, caller: &Caller) -> DomainResult<Vec<OwnerDetails>> {
        if !caller.is_staff() {
            return Err(DomainError::Forbidden("Only staff can list EV owners.".into()));
        }
        let profiles = self.repos.owners().find_all().await?;
        let user_ids: Vec<Uuid> = profiles.iter().map(|p| p.user_id).collect();
        let users: HashMap<Uuid, User> = self
            .repos
            .users()
            .find_many(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        Ok(profiles
            .into_iter()
            .filter_map(|profile| match users.get(&profile.user_id) {
                Some(user) => Some(OwnerDetails::new(profile, user)),
                None => {
                    warn!(nic = %profile.nic, integrity = true, "Owner profile without user");
                    None
                }
            })
            .collect())
    }

    // ── Commands ────────────────────────────────────────────────

    /// Owners edit their own profile. The NIC never changes.
    pub async fn update(
        &self,
        caller: &Caller,
        nic: &str,
        patch: UpdateOwnerRequest,
    ) -> DomainResult<OwnerOutcome> {
        patch.validate()?;
        let nic = nic.trim().to_uppercase();
        let mut owner = match self.load(&nic).await {
            Ok(owner) if owner.profile.user_id == caller.user_id => owner,
            Ok(_) | Err(DomainError::NotFound { .. }) => {
                return Err(DomainError::Forbidden(PROFILE_DENIED.into()))
            }
            Err(e) => return Err(e),
        };
        if let Some(requested) = &patch.nic {
            if requested.trim().to_uppercase() != owner.profile.nic {
                return Err(DomainError::Validation("NIC cannot be changed.".into()));
            }
        }

        let profile = &mut owner.profile;
        if let Some(name) = patch.full_name {
            profile.full_name = name;
        }
        if let Some(phone) = patch.phone {
            profile.phone = phone;
        }
        if let Some(address) = patch.address {
            profile.address = Some(address);
        }
        if let Some(model) = patch.vehicle_model {
            profile.vehicle_model = Some(model);
        }
        if let Some(plate) = patch.license_plate {
            profile.license_plate = Some(plate);
        }
        profile.updated_at = self.clock.now();

        if !self.repos.owners().update(profile.clone()).await? {
            return Err(DomainError::Forbidden(PROFILE_DENIED.into()));
        }
        Ok(OwnerOutcome {
            owner,
            message: "EV owner profile updated.".into(),
        })
    }

    /// Change the profile status and carry it to the user's active flag.
    /// Owners may only deactivate themselves; Backoffice may do either.
    pub async fn set_status(
        &self,
        caller: &Caller,
        nic: &str,
        status: AccountStatus,
    ) -> DomainResult<OwnerOutcome> {
        let nic = nic.trim().to_uppercase();
        let owner = match caller.role {
            UserRole::Backoffice => self.load(&nic).await?,
            UserRole::EVOwner => {
                if status.is_active() {
                    return Err(DomainError::Forbidden(
                        "Only Backoffice users can reactivate an account.".into(),
                    ));
                }
                match self.load(&nic).await {
                    Ok(owner) if owner.profile.user_id == caller.user_id => owner,
                    Ok(_) | Err(DomainError::NotFound { .. }) => {
                        return Err(DomainError::Forbidden(PROFILE_DENIED.into()))
                    }
                    Err(e) => return Err(e),
                }
            }
            UserRole::StationOperator => {
                return Err(DomainError::Forbidden(
                    "Station operators cannot change account status.".into(),
                ))
            }
        };

        let now = self.clock.now();
        let previous = owner.profile.clone();
        let mut profile = owner.profile;
        profile.status = status;
        profile.updated_at = now;
        detached(write_status(self.repos.clone(), previous, profile.clone(), now)).await?;

        info!(nic = %nic, status = %status, "Owner status changed");
        Ok(OwnerOutcome {
            owner: OwnerDetails {
                profile,
                email: owner.email,
                is_active: status.is_active(),
            },
            message: format!("EV owner account is now {}.", status),
        })
    }

    /// Remove an owner with no live bookings.
    pub async fn delete(&self, caller: &Caller, nic: &str) -> DomainResult<()> {
        require_backoffice(caller, "delete EV owners")?;
        let nic = nic.trim().to_uppercase();
        let profile = self
            .repos
            .owners()
            .find_by_nic(&nic)
            .await?
            .ok_or_else(|| nic_not_found(&nic))?;

        let live = self
            .repos
            .bookings()
            .find_by_owner(profile.user_id)
            .await?
            .into_iter()
            .filter(|b| b.is_active())
            .count();
        if live > 0 {
            return Err(DomainError::Conflict(format!(
                "EV owner has {} active booking(s) and cannot be deleted.",
                live
            )));
        }

        detached(remove_account(self.repos.clone(), profile)).await?;
        info!(nic = %nic, "EV owner deleted");
        Ok(())
    }

    // ── Internals ───────────────────────────────────────────────

    async fn load(&self, nic: &str) -> DomainResult<OwnerDetails> {
        let profile = self
            .repos
            .owners()
            .find_by_nic(nic)
            .await?
            .ok_or_else(|| nic_not_found(nic))?;
        match self.repos.users().find_by_id(profile.user_id).await? {
            Some(user) => Ok(OwnerDetails::new(profile, &user)),
            None => {
                warn!(nic = %nic, user_id = %profile.user_id, integrity = true, "Owner profile without user");
                Err(nic_not_found(nic))
            }
        }
    }
}

// ── Write phases ────────────────────────────────────────────────

async fn write_account(
    repos: Arc<dyn RepositoryProvider>,
    user: User,
    profile: OwnerProfile,
) -> DomainResult<()> {
    repos.users().insert(user.clone()).await?;
    if let Err(e) = repos.owners().insert(profile).await {
        warn!(user_id = %user.id, error = %e, "Profile insert failed, removing user");
        if let Err(cleanup) = repos.users().delete(user.id).await {
            warn!(
                user_id = %user.id,
                error = %cleanup,
                integrity = true,
                "Orphaned user left behind"
            );
        }
        return Err(e);
    }
    Ok(())
}

async fn write_status(
    repos: Arc<dyn RepositoryProvider>,
    previous: OwnerProfile,
    profile: OwnerProfile,
    now: DateTime<Utc>,
) -> DomainResult<()> {
    if !repos.owners().update(profile.clone()).await? {
        return Err(DomainError::not_found("OwnerProfile", profile.id));
    }
    let active = profile.status.is_active();
    if let Err(e) = cascade_to_user(repos.as_ref(), profile.user_id, active, now).await {
        warn!(nic = %profile.nic, error = %e, "User status cascade failed, reverting profile");
        if let Err(revert) = repos.owners().update(previous).await {
            warn!(nic = %profile.nic, error = %revert, integrity = true, "Profile revert failed");
        }
        return Err(e);
    }
    Ok(())
}

async fn cascade_to_user(
    repos: &dyn RepositoryProvider,
    user_id: Uuid,
    active: bool,
    now: DateTime<Utc>,
) -> DomainResult<()> {
    let mut user = repos
        .users()
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| DomainError::not_found("User", user_id))?;
    user.is_active = active;
    user.updated_at = now;
    if repos.users().update(user).await? {
        Ok(())
    } else {
        Err(DomainError::not_found("User", user_id))
    }
}

/// Profile first, then user; a failed user delete puts the profile back.
async fn remove_account(
    repos: Arc<dyn RepositoryProvider>,
    profile: OwnerProfile,
) -> DomainResult<()> {
    repos.owners().delete_by_nic(&profile.nic).await?;
    if let Err(e) = repos.users().delete(profile.user_id).await {
        warn!(user_id = %profile.user_id, error = %e, "User delete failed, restoring profile");
        if let Err(restore) = repos.owners().insert(profile.clone()).await {
            warn!(
                user_id = %profile.user_id,
                error = %restore,
                integrity = true,
                "User left without profile"
            );
        }
        return Err(e);
    }
    Ok(())
}

fn nic_not_found(nic: &str) -> DomainError {
    DomainError::NotFound {
        entity: "OwnerProfile",
        field: "nic",
        value: nic.to_string(),
    }
}

/// Old format `#########V` / `#########X` or new format of 12 digits.
fn normalize_nic(raw: &str) -> DomainResult<String> {
    let nic = raw.trim().to_uppercase();
    let bytes = nic.as_bytes();
    let old_format = bytes.len() == 10
        && bytes[..9].iter().all(u8::is_ascii_digit)
        && matches!(bytes[9], b'V' | b'X');
    let new_format = bytes.len() == 12 && bytes.iter().all(u8::is_ascii_digit);
    if old_format || new_format {
        Ok(nic)
    } else {
        Err(DomainError::Validation("Invalid NIC format.".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use crate::application::booking::CreateBookingRequest;
    use crate::application::testing::{fail, FaultyRepos, Fixture};
    use crate::domain::booking::ChargingMode;
    use crate::domain::{OwnerProfileRepository, UserRepository};
    use crate::infrastructure::crypto::verify_password;
    use crate::shared::cancellable;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
        broken: bool,
    }

    #[async_trait]
    impl NotificationSender for RecordingNotifier {
        async fn send_temporary_password(&self, email: &str, password: &str) -> DomainResult<()> {
            if self.broken {
                return Err(DomainError::Storage("smtp down".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((email.to_string(), password.to_string()));
            Ok(())
        }
    }

    fn service(fx: &Fixture, notifier: Arc<RecordingNotifier>) -> OwnerService {
        OwnerService::new(fx.repos(), notifier, fx.shared_clock())
    }

    fn registration(email: &str, nic: &str) -> RegisterOwnerRequest {
        RegisterOwnerRequest {
            email: email.into(),
            password: "charge-me-up".into(),
            nic: nic.into(),
            full_name: "Nimal Perera".into(),
            phone: "0771234567".into(),
            address: None,
            vehicle_model: Some("Nissan Leaf".into()),
            license_plate: Some("CAB-1234".into()),
        }
    }

    #[tokio::test]
    async fn registration_writes_user_and_profile() {
        let fx = Fixture::new();
        let owners = service(&fx, Arc::default());

        let outcome = owners
            .register(registration("Nimal@EV.test", "851234567v"))
            .await
            .unwrap();
        assert_eq!(outcome.owner.profile.nic, "851234567V");
        assert_eq!(outcome.owner.email, "nimal@ev.test");

        let user = fx
            .repos
            .users()
            .find_by_id(outcome.owner.profile.user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.role, UserRole::EVOwner);
        assert!(verify_password("charge-me-up", &user.password_hash));

        let err = owners
            .register(registration("nimal@ev.test", "200012345678"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "conflict");
        let err = owners
            .register(registration("other@ev.test", "851234567V"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "conflict");
        let err = owners
            .register(registration("third@ev.test", "12345"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn failed_profile_insert_removes_the_user() {
        let repos = Arc::new(FaultyRepos::default());
        let fx = Fixture::with_repos(repos.clone());
        let owners = service(&fx, Arc::default());

        fail(&repos.owners.fail_insert, true);
        let err = owners
            .register(registration("kamal@ev.test", "200012345678"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "storage");
        assert!(fx
            .repos
            .users()
            .find_by_email("kamal@ev.test")
            .await
            .unwrap()
            .is_none());

        fail(&repos.owners.fail_insert, false);
        assert!(owners
            .register(registration("kamal@ev.test", "200012345678"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn staff_created_owner_receives_temporary_password() {
        let fx = Fixture::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let owners = service(&fx, notifier.clone());
        let staff = fx.backoffice().await;
        let request = CreateOwnerRequest {
            email: "sunil@ev.test".into(),
            nic: "199912345678".into(),
            full_name: "Sunil Silva".into(),
            phone: "0712345678".into(),
            address: None,
            vehicle_model: None,
            license_plate: None,
        };

        let outcome = owners.create_by_staff(&staff, request.clone()).await.unwrap();
        let sent = notifier.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "sunil@ev.test");
        assert_eq!(sent[0].1.len(), 12);
        let user = fx
            .repos
            .users()
            .find_by_id(outcome.owner.profile.user_id)
            .await
            .unwrap()
            .unwrap();
        assert!(verify_password(&sent[0].1, &user.password_hash));

        let owner = fx.owner().await;
        let err = owners.create_by_staff(&owner, request).await.unwrap_err();
        assert_eq!(err.kind(), "forbidden");
    }

    #[tokio::test]
    async fn notification_failure_keeps_the_account() {
        let fx = Fixture::new();
        let notifier = Arc::new(RecordingNotifier {
            broken: true,
            ..Default::default()
        });
        let owners = service(&fx, notifier);
        let staff = fx.backoffice().await;

        let outcome = owners
            .create_by_staff(
                &staff,
                CreateOwnerRequest {
                    email: "ruwan@ev.test".into(),
                    nic: "901234567X".into(),
                    full_name: "Ruwan".into(),
                    phone: "0701234567".into(),
                    address: None,
                    vehicle_model: None,
                    license_plate: None,
                },
            )
            .await
            .unwrap();
        assert!(outcome.message.contains("could not be sent"));
        assert!(owners.get_by_nic(&staff, "901234567x").await.is_ok());
    }

    #[tokio::test]
    async fn profile_without_user_reads_as_not_found() {
        let fx = Fixture::new();
        let owners = service(&fx, Arc::default());
        let staff = fx.backoffice().await;
        let stray =
            OwnerProfile::new(Uuid::new_v4(), "777777777V", "Ghost", "0770000000", fx.now());
        fx.repos.owners().insert(stray).await.unwrap();

        let err = owners.get_by_nic(&staff, "777777777V").await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
        assert!(owners.list(&staff).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn owners_edit_only_themselves_and_never_the_nic() {
        let fx = Fixture::new();
        let owners = service(&fx, Arc::default());
        let mine = owners
            .register(registration("me@ev.test", "851111111V"))
            .await
            .unwrap()
            .owner;
        let theirs = owners
            .register(registration("them@ev.test", "852222222V"))
            .await
            .unwrap()
            .owner;
        let me = Caller::owner(mine.profile.user_id);

        let outcome = owners
            .update(
                &me,
                "851111111V",
                UpdateOwnerRequest {
                    phone: Some("0779999999".into()),
                    nic: Some("851111111v".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.owner.profile.phone, "0779999999");

        let err = owners
            .update(
                &me,
                "851111111V",
                UpdateOwnerRequest {
                    nic: Some("853333333V".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");

        for target in [theirs.profile.nic.as_str(), "859999999V"] {
            let err = owners
                .update(&me, target, UpdateOwnerRequest::default())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "forbidden");
        }
    }

    #[tokio::test]
    async fn status_change_cascades_to_user() {
        let fx = Fixture::new();
        let owners = service(&fx, Arc::default());
        let admin = fx.backoffice().await;
        let details = owners
            .register(registration("lal@ev.test", "200098765432"))
            .await
            .unwrap()
            .owner;
        let me = Caller::owner(details.profile.user_id);

        let outcome = owners
            .set_status(&me, "200098765432", AccountStatus::Deactivated)
            .await
            .unwrap();
        assert!(!outcome.owner.is_active);
        let user = fx.repos.users().find_by_id(me.user_id).await.unwrap().unwrap();
        assert!(!user.is_active);

        let err = owners
            .set_status(&me, "200098765432", AccountStatus::Active)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "forbidden");

        owners
            .set_status(&admin, "200098765432", AccountStatus::Active)
            .await
            .unwrap();
        let user = fx.repos.users().find_by_id(me.user_id).await.unwrap().unwrap();
        assert!(user.is_active);
    }

    #[tokio::test]
    async fn failed_cascade_reverts_profile_status() {
        let repos = Arc::new(FaultyRepos::default());
        let fx = Fixture::with_repos(repos.clone());
        let owners = service(&fx, Arc::default());
        let admin = fx.backoffice().await;
        owners
            .register(registration("amal@ev.test", "200011112222"))
            .await
            .unwrap();

        fail(&repos.users.fail_update, true);
        let err = owners
            .set_status(&admin, "200011112222", AccountStatus::Deactivated)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "storage");

        let profile = fx
            .repos
            .owners()
            .find_by_nic("200011112222")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.status, AccountStatus::Active);
    }

    #[tokio::test]
    async fn delete_is_refused_while_bookings_are_live() {
        let fx = Fixture::new();
        let owners = service(&fx, Arc::default());
        let admin = fx.backoffice().await;
        let station = fx.station(1, 0).await;
        let details = owners
            .register(registration("dev@ev.test", "200055556666"))
            .await
            .unwrap()
            .owner;
        let me = Caller::owner(details.profile.user_id);
        let booking = fx
            .bookings()
            .create(
                &me,
                CreateBookingRequest {
                    owner_id: me.user_id,
                    station_id: station.id,
                    mode: ChargingMode::Ac,
                    slot_id: "A1".into(),
                    start: fx.hours(24),
                    end: fx.hours(25),
                },
            )
            .await
            .unwrap()
            .booking;

        let err = owners.delete(&admin, "200055556666").await.unwrap_err();
        assert_eq!(err.kind(), "conflict");
        assert_eq!(owners.delete(&me, "200055556666").await.unwrap_err().kind(), "forbidden");

        fx.bookings().cancel(&me, booking.id).await.unwrap();
        owners.delete(&admin, "200055556666").await.unwrap();
        assert!(fx.repos.users().find_by_id(me.user_id).await.unwrap().is_none());
        assert!(fx
            .repos
            .owners()
            .find_by_nic("200055556666")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn registration_outlives_a_cancelled_request() {
        let repos = Arc::new(FaultyRepos::default());
        let fx = Fixture::with_repos(repos.clone());
        let owners = service(&fx, Arc::default());
        let token = CancellationToken::new();

        repos.owners.insert_gate.arm();
        let (result, ()) = tokio::join!(
            cancellable(&token, owners.register(registration("saman@ev.test", "200077778888"))),
            async {
                repos.owners.insert_gate.reached().await;
                token.cancel();
            }
        );
        assert_eq!(result.unwrap_err().kind(), "cancelled");

        // The user is written and the profile insert is still parked.
        repos.owners.insert_gate.release();
        let profile = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if let Some(p) = fx.repos.owners().find_by_nic("200077778888").await.unwrap() {
                    return p;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        let user = fx
            .repos
            .users()
            .find_by_email("saman@ev.test")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.user_id, user.id);
    }

    #[tokio::test]
    async fn failed_user_delete_restores_profile() {
        let repos = Arc::new(FaultyRepos::default());
        let fx = Fixture::with_repos(repos.clone());
        let owners = service(&fx, Arc::default());
        let admin = fx.backoffice().await;
        let details = owners
            .register(registration("nuwan@ev.test", "200033334444"))
            .await
            .unwrap()
            .owner;

        fail(&repos.users.fail_delete, true);
        let err = owners.delete(&admin, "200033334444").await.unwrap_err();
        assert_eq!(err.kind(), "storage");
        let restored = owners.get_by_nic(&admin, "200033334444").await.unwrap();
        assert_eq!(restored.profile, details.profile);

        fail(&repos.users.fail_delete, false);
        owners.delete(&admin, "200033334444").await.unwrap();
        assert!(fx
            .repos
            .users()
            .find_by_id(details.profile.user_id)
            .await
            .unwrap()
            .is_none());
    }
}
