//! Caller checks shared by the services

use uuid::Uuid;

use crate::domain::{Caller, DomainError, DomainResult, RepositoryProvider, UserRole};

/// Station the calling operator is assigned to, if any.
pub(crate) async fn assigned_station(
    repos: &dyn RepositoryProvider,
    caller: &Caller,
) -> DomainResult<Option<Uuid>> {
    if caller.role != UserRole::StationOperator {
        return Ok(None);
    }
    Ok(repos
        .users()
        .find_by_id(caller.user_id)
        .await?
        .filter(|u| u.is_active)
        .and_then(|u| u.assigned_station_id))
}

/// Backoffice passes; operators must be assigned to `station_id`.
pub(crate) async fn ensure_station_access(
    repos: &dyn RepositoryProvider,
    caller: &Caller,
    station_id: Uuid,
) -> DomainResult<()> {
    match caller.role {
        UserRole::Backoffice => Ok(()),
        UserRole::StationOperator => {
            if assigned_station(repos, caller).await? == Some(station_id) {
                Ok(())
            } else {
                Err(DomainError::Forbidden(
                    "You are not assigned to this station.".into(),
                ))
            }
        }
        UserRole::EVOwner => Err(DomainError::Forbidden(
            "Only staff can manage station bookings.".into(),
        )),
    }
}

pub(crate) fn require_backoffice(caller: &Caller, action: &str) -> DomainResult<()> {
    if caller.is_backoffice() {
        Ok(())
    } else {
        Err(DomainError::Forbidden(format!(
            "Only Backoffice users can {}.",
            action
        )))
    }
}
