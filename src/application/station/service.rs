//! Station management service
//!
//! Station-wide changes that can strand bookings (leaving Active, shrinking
//! a slot pool) run under the station's exclusive lock, so no booking can be
//! created on the station between the guard query and the write. Operator
//! assignment takes the same lock, since it rewrites the station document
//! too.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::application::access::require_backoffice;
use crate::application::locks::SlotLockRegistry;
use crate::domain::booking::{Booking, ChargingMode};
use crate::domain::station::inventory::{generate_slot_ids, removed_slot_ids};
use crate::domain::{
    Caller, GeoPoint, RepositoryProvider, Station, StationStatus, User, UserRole,
};
use crate::shared::{detached, DomainError, DomainResult, PresentationZone, SharedClock};

const MAX_UPCOMING: usize = 2;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateStationRequest {
    #[validate(length(min = 1, max = 120, message = "Station name is required."))]
    pub name: String,
    #[validate(length(min = 1, max = 32, message = "Station code is required."))]
    pub code: String,
    #[validate(range(max = 64))]
    pub ac_slot_count: u32,
    #[validate(range(max = 64))]
    pub dc_slot_count: u32,
    #[validate(length(min = 1, message = "Address is required."))]
    pub address_line1: String,
    pub address_line2: Option<String>,
    #[validate(length(min = 1, message = "City is required."))]
    pub city: String,
    pub location: GeoPoint,
    pub notes: Option<String>,
    /// Defaults to Active
    pub status: Option<StationStatus>,
}

/// Partial station edit. Unset fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateStationRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub code: Option<String>,
    #[validate(range(max = 64))]
    pub ac_slot_count: Option<u32>,
    #[validate(range(max = 64))]
    pub dc_slot_count: Option<u32>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub location: Option<GeoPoint>,
    pub notes: Option<String>,
    pub status: Option<StationStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum OperatorAssignment {
    /// The given operators become the station's whole operator set
    Replace,
    /// The given operators are added to the existing set
    Append,
}

#[derive(Debug, Clone, Serialize)]
pub struct StationOutcome {
    pub station: Station,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub enum Deactivation {
    Deactivated(Station),
    /// Pending or Approved bookings that keep the station active
    Blocked(Vec<Uuid>),
}

#[derive(Debug, Clone, Serialize)]
pub struct OperatorSummary {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
}

impl From<&User> for OperatorSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpcomingBooking {
    pub booking_id: Uuid,
    pub mode: ChargingMode,
    pub slot_id: String,
    pub starts_at_local: DateTime<FixedOffset>,
    pub ends_at_local: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StationOverview {
    #[serde(flatten)]
    pub station: Station,
    pub operators: Vec<OperatorSummary>,
    pub upcoming: Vec<UpcomingBooking>,
}

pub struct StationService {
    repos: Arc<dyn RepositoryProvider>,
    locks: Arc<SlotLockRegistry>,
    clock: SharedClock,
    zone: PresentationZone,
    // Serializes operator assignment so one operator cannot land on two stations.
    assignments: Arc<Mutex<()>>,
}

impl StationService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        locks: Arc<SlotLockRegistry>,
        clock: SharedClock,
        zone: PresentationZone,
    ) -> Self {
        Self {
            repos,
            locks,
            clock,
            zone,
            assignments: Arc::new(Mutex::new(())),
        }
    }

    // ── Commands ────────────────────────────────────────────────

    pub async fn create(
        &self,
        caller: &Caller,
        request: CreateStationRequest,
    ) -> DomainResult<StationOutcome> {
        require_backoffice(caller, "create stations")?;
        request.validate()?;
        check_location(&request.location)?;
        if request.ac_slot_count + request.dc_slot_count == 0 {
            return Err(DomainError::Validation(
                "A station needs at least one AC or DC slot.".into(),
            ));
        }

        let mut station = Station::new(
            request.name.trim(),
            request.code.trim(),
            request.ac_slot_count,
            request.dc_slot_count,
            self.clock.now(),
        );
        station.address_line1 = request.address_line1;
        station.address_line2 = request.address_line2;
        station.city = request.city;
        station.location = request.location;
        station.notes = request.notes;
        station.status = request.status.unwrap_or_default();

        self.repos.stations().insert(station.clone()).await?;
        info!(station_id = %station.id, code = %station.code, "Station created");

        Ok(StationOutcome {
            station,
            message: "Station created successfully.".into(),
        })
    }

    /// Patch a station. Leaving Active with live bookings, or shrinking a
    /// slot pool under a live booking, rejects the whole edit.
    pub async fn update(
        &self,
        caller: &Caller,
        station_id: Uuid,
        patch: UpdateStationRequest,
    ) -> DomainResult<StationOutcome> {
        require_backoffice(caller, "update stations")?;
        patch.validate()?;
        if let Some(location) = &patch.location {
            check_location(location)?;
        }

        let _guard = self.locks.lock_station(station_id).await;
        let mut station = self.load(station_id).await?;
        let active = self
            .repos
            .bookings()
            .find_active_for_station(station_id)
            .await?;

        if let Some(status) = patch.status {
            if status != StationStatus::Active && !active.is_empty() {
                metrics::counter!("station_deactivation_rejected_total").increment(1);
                warn!(
                    station_id = %station_id,
                    active = active.len(),
                    "Station status change rejected"
                );
                return Err(DomainError::Conflict(format!(
                    "Cannot set station to {} while it has {} active booking(s).",
                    status,
                    active.len()
                )));
            }
        }

        for (mode, count) in [
            (ChargingMode::Ac, patch.ac_slot_count),
            (ChargingMode::Dc, patch.dc_slot_count),
        ] {
            if let Some(count) = count {
                check_shrink(&station, mode, count, &active)?;
            }
        }
        let total_ac = patch.ac_slot_count.unwrap_or(station.ac_slot_count);
        let total_dc = patch.dc_slot_count.unwrap_or(station.dc_slot_count);
        if total_ac + total_dc == 0 {
            return Err(DomainError::Validation(
                "A station needs at least one AC or DC slot.".into(),
            ));
        }

        if let Some(name) = patch.name {
            station.name = name;
        }
        if let Some(code) = patch.code {
            station.code = code;
        }
        if let Some(count) = patch.ac_slot_count {
            station.set_slot_count(ChargingMode::Ac, count);
        }
        if let Some(count) = patch.dc_slot_count {
            station.set_slot_count(ChargingMode::Dc, count);
        }
        if let Some(line) = patch.address_line1 {
            station.address_line1 = line;
        }
        if let Some(line) = patch.address_line2 {
            station.address_line2 = Some(line);
        }
        if let Some(city) = patch.city {
            station.city = city;
        }
        if let Some(location) = patch.location {
            station.location = location;
        }
        if let Some(notes) = patch.notes {
            station.notes = Some(notes);
        }
        if let Some(status) = patch.status {
            station.status = status;
        }
        station.updated_at = self.clock.now();

        self.store(station.clone()).await?;
        info!(station_id = %station_id, status = %station.status, "Station updated");

        Ok(StationOutcome {
            station,
            message: "Station updated successfully.".into(),
        })
    }

    /// Deactivate when no live booking references the station; otherwise
    /// report the bookings in the way.
    pub async fn deactivate_if_idle(
        &self,
        caller: &Caller,
        station_id: Uuid,
    ) -> DomainResult<Deactivation> {
        require_backoffice(caller, "deactivate stations")?;

        let _guard = self.locks.lock_station(station_id).await;
        let mut station = self.load(station_id).await?;
        let active = self
            .repos
            .bookings()
            .find_active_for_station(station_id)
            .await?;
        if !active.is_empty() {
            metrics::counter!("station_deactivation_rejected_total").increment(1);
            return Ok(Deactivation::Blocked(active.iter().map(|b| b.id).collect()));
        }

        station.status = StationStatus::Deactivated;
        station.updated_at = self.clock.now();
        self.store(station.clone()).await?;
        info!(station_id = %station_id, "🔌 Station deactivated");
        Ok(Deactivation::Deactivated(station))
    }

    /// Replace or extend the station's operator set. Each operator works at
    /// one station at most; the user records are kept in step.
    pub async fn assign_operators(
        &self,
        caller: &Caller,
        station_id: Uuid,
        operator_ids: Vec<Uuid>,
        mode: OperatorAssignment,
    ) -> DomainResult<StationOutcome> {
        require_backoffice(caller, "assign operators")?;
        let serial = self.assignments.clone().lock_owned().await;
        let guard = self.locks.lock_station(station_id).await;

        let mut station = self.load(station_id).await?;
        let previous = station.clone();

        let mut requested = Vec::new();
        for id in operator_ids {
            if !requested.contains(&id) {
                requested.push(id);
            }
        }
        let candidates = self.repos.users().find_many(&requested).await?;
        if let Some(missing) = requested
            .iter()
            .find(|id| !candidates.iter().any(|u| u.id == **id))
        {
            return Err(DomainError::not_found("User", *missing));
        }
        for user in &candidates {
            self.check_assignable(user, station_id).await?;
        }

        let next: Vec<Uuid> = match mode {
            OperatorAssignment::Replace => requested,
            OperatorAssignment::Append => {
                let mut ids = station.operator_ids.clone();
                ids.extend(requested.into_iter().filter(|id| !previous.has_operator(*id)));
                ids
            }
        };
        let removed: Vec<Uuid> = previous
            .operator_ids
            .iter()
            .filter(|id| !next.contains(id))
            .copied()
            .collect();

        let now = self.clock.now();
        station.operator_ids = next;
        station.updated_at = now;

        // The locks move into the write phase and are released when it ends.
        let repos = self.repos.clone();
        let written = station.clone();
        detached(async move {
            let _held = (serial, guard);
            write_assignment(repos.as_ref(), written, previous, &removed, now).await
        })
        .await?;

        info!(
            station_id = %station_id,
            operators = station.operator_ids.len(),
            "Operators assigned"
        );
        Ok(StationOutcome {
            station,
            message: "Operators assigned successfully.".into(),
        })
    }

    // ── Queries ─────────────────────────────────────────────────

    pub async fn get(&self, station_id: Uuid) -> DomainResult<Station> {
        self.load(station_id).await
    }

    pub async fn list(&self) -> DomainResult<Vec<Station>> {
        self.repos.stations().find_all().await
    }

    pub async fn list_active(&self) -> DomainResult<Vec<Station>> {
        self.repos
            .stations()
            .find_by_status(StationStatus::Active)
            .await
    }

    /// Active station operators not linked to any station
    pub async fn unassigned_operators(
        &self,
        caller: &Caller,
    ) -> DomainResult<Vec<OperatorSummary>> {
        require_backoffice(caller, "view operators")?;
        let assigned: HashSet<Uuid> = self
            .repos
            .stations()
            .assigned_operator_ids()
            .await?
            .into_iter()
            .collect();
        Ok(self
            .repos
            .users()
            .find_by_role(UserRole::StationOperator)
            .await?
            .iter()
            .filter(|u| u.is_active && !assigned.contains(&u.id))
            .map(OperatorSummary::from)
            .collect())
    }

    /// Every station with its operators and its next two live bookings.
    pub async fn stations_with_upcoming(
        &self,
        caller: &Caller,
    ) -> DomainResult<Vec<StationOverview>> {
        require_backoffice(caller, "view the station overview")?;
        let stations = self.repos.stations().find_all().await?;
        let station_ids: Vec<Uuid> = stations.iter().map(|s| s.id).collect();

        let mut upcoming: HashMap<Uuid, Vec<Booking>> = HashMap::new();
        for booking in self
            .repos
            .bookings()
            .find_upcoming_for_stations(&station_ids, self.clock.now())
            .await?
        {
            let entry = upcoming.entry(booking.station_id).or_default();
            if entry.len() < MAX_UPCOMING {
                entry.push(booking);
            }
        }

        let mut operator_ids: Vec<Uuid> = stations
            .iter()
            .flat_map(|s| s.operator_ids.iter().copied())
            .collect();
        operator_ids.sort();
        operator_ids.dedup();
        let operators: HashMap<Uuid, User> = self
            .repos
            .users()
            .find_many(&operator_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        Ok(stations
            .into_iter()
            .map(|station| {
                let ops = station
                    .operator_ids
                    .iter()
                    .filter_map(|id| operators.get(id))
                    .map(OperatorSummary::from)
                    .collect();
                let next = upcoming
                    .remove(&station.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|b| UpcomingBooking {
                        booking_id: b.id,
                        mode: b.mode,
                        slot_id: b.slot_id,
                        starts_at_local: self.zone.to_local(b.window.start),
                        ends_at_local: self.zone.to_local(b.window.end),
                    })
                    .collect();
                StationOverview {
                    station,
                    operators: ops,
                    upcoming: next,
                }
            })
            .collect())
    }

    // ── Internals ───────────────────────────────────────────────

    async fn load(&self, station_id: Uuid) -> DomainResult<Station> {
        self.repos
            .stations()
            .find_by_id(station_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Station", station_id))
    }

    async fn store(&self, station: Station) -> DomainResult<()> {
        store_station(self.repos.as_ref(), station).await
    }

    async fn check_assignable(&self, user: &User, station_id: Uuid) -> DomainResult<()> {
        if user.role != UserRole::StationOperator {
            return Err(DomainError::Validation(format!(
                "User {} is not a station operator.",
                user.email
            )));
        }
        if !user.is_active {
            return Err(DomainError::Validation(format!(
                "Operator {} is deactivated.",
                user.email
            )));
        }
        let elsewhere = match user.assigned_station_id {
            Some(id) => id != station_id,
            None => self
                .repos
                .stations()
                .find_by_operator(user.id)
                .await?
                .is_some_and(|s| s.id != station_id),
        };
        if elsewhere {
            return Err(DomainError::Conflict(format!(
                "Operator {} is already assigned to another station.",
                user.email
            )));
        }
        Ok(())
    }
}

// ── Write phases ────────────────────────────────────────────────

async fn store_station(repos: &dyn RepositoryProvider, station: Station) -> DomainResult<()> {
    let id = station.id;
    if repos.stations().update(station).await? {
        Ok(())
    } else {
        Err(DomainError::not_found("Station", id))
    }
}

/// Store the new operator set, then bring the user records in step. A
/// failed user sync puts the previous station document back.
async fn write_assignment(
    repos: &dyn RepositoryProvider,
    station: Station,
    previous: Station,
    removed: &[Uuid],
    now: DateTime<Utc>,
) -> DomainResult<()> {
    let station_id = station.id;
    let assigned = station.operator_ids.clone();
    store_station(repos, station).await?;

    if let Err(e) = sync_assignments(repos, station_id, &assigned, removed, now).await {
        warn!(station_id = %station_id, error = %e, "Operator sync failed, restoring station");
        if let Err(restore) = store_station(repos, previous).await {
            warn!(
                station_id = %station_id,
                error = %restore,
                integrity = true,
                "Station restore failed"
            );
        }
        return Err(e);
    }
    Ok(())
}

/// Point `assigned` users at the station and clear `removed` ones.
/// On failure the users already written are put back.
async fn sync_assignments(
    repos: &dyn RepositoryProvider,
    station_id: Uuid,
    assigned: &[Uuid],
    removed: &[Uuid],
    now: DateTime<Utc>,
) -> DomainResult<()> {
    let mut written: Vec<User> = Vec::new();

    let mut changes = Vec::new();
    for user in repos.users().find_many(assigned).await? {
        if user.assigned_station_id != Some(station_id) {
            changes.push((user, Some(station_id)));
        }
    }
    for user in repos.users().find_many(removed).await? {
        if user.assigned_station_id == Some(station_id) {
            changes.push((user, None));
        }
    }

    for (previous, target) in changes {
        let mut updated = previous.clone();
        updated.assigned_station_id = target;
        updated.updated_at = now;
        if let Err(e) = repos.users().update(updated).await {
            for user in written {
                let id = user.id;
                if let Err(revert) = repos.users().update(user).await {
                    warn!(user_id = %id, error = %revert, integrity = true, "Operator revert failed");
                }
            }
            return Err(e);
        }
        written.push(previous);
    }
    Ok(())
}

fn check_location(location: &GeoPoint) -> DomainResult<()> {
    if !(-90.0..=90.0).contains(&location.latitude)
        || !(-180.0..=180.0).contains(&location.longitude)
    {
        return Err(DomainError::Validation("Invalid station coordinates.".into()));
    }
    Ok(())
}

/// Reject a slot-count change that would remove a slot a live booking holds.
fn check_shrink(
    station: &Station,
    mode: ChargingMode,
    count: u32,
    active: &[Booking],
) -> DomainResult<()> {
    let after = generate_slot_ids(mode, count);
    let removed = removed_slot_ids(station.slots_for(mode), &after);
    let orphaned: Vec<String> = active
        .iter()
        .filter(|b| b.mode == mode && removed.contains(&b.slot_id))
        .map(|b| b.id.to_string())
        .collect();
    if orphaned.is_empty() {
        return Ok(());
    }
    Err(DomainError::Conflict(format!(
        "Reducing {} slots to {} would orphan active bookings: {}",
        mode,
        count,
        orphaned.join(", ")
    )))
}
