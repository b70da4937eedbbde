//! Booking lifecycle service
//!
//! Every write that occupies a slot runs the conflict check and the store
//! write under that slot's lock. Status-only transitions are compare-and-set
//! updates in the store, so two concurrent approvals or cancellations cannot
//! both succeed.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::policy::BookingPolicy;
use super::views::{BookingDetails, BookingOutcome, OperatorBookingView};
use crate::application::access::{assigned_station, ensure_station_access, require_backoffice};
use crate::application::locks::{SlotKey, SlotLockRegistry};
use crate::application::ports::QrEncoder;
use crate::domain::booking::state_machine::{ensure_allowed, issues_qr};
use crate::domain::booking::{
    Booking, BookingAction, BookingStatus, ChargingMode, ConflictQuery, TimeWindow,
};
use crate::domain::{Caller, OwnerProfile, RepositoryProvider, Station, User, UserRole};
use crate::shared::errors::parse_id;
use crate::shared::{DomainError, DomainResult, PresentationZone, SharedClock};

const ACCESS_DENIED: &str = "You are not authorized to access this booking.";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBookingRequest {
    /// EV owner the booking is for
    pub owner_id: Uuid,
    pub station_id: Uuid,
    pub mode: ChargingMode,
    #[validate(length(min = 1, max = 16, message = "Slot id is required."))]
    pub slot_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Partial edit. Unset fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateBookingRequest {
    pub station_id: Option<Uuid>,
    pub mode: Option<ChargingMode>,
    #[validate(length(min = 1, max = 16, message = "Slot id cannot be empty."))]
    pub slot_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Pending or Approved; when unset the caller's role decides
    pub status: Option<BookingStatus>,
}

pub struct BookingService {
    repos: Arc<dyn RepositoryProvider>,
    locks: Arc<SlotLockRegistry>,
    qr: Arc<dyn QrEncoder>,
    clock: SharedClock,
    policy: BookingPolicy,
    zone: PresentationZone,
}

impl BookingService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        locks: Arc<SlotLockRegistry>,
        qr: Arc<dyn QrEncoder>,
        clock: SharedClock,
        policy: BookingPolicy,
        zone: PresentationZone,
    ) -> Self {
        Self {
            repos,
            locks,
            qr,
            clock,
            policy,
            zone,
        }
    }

    // ── Commands ────────────────────────────────────────────────

    /// EV owners create Pending bookings for themselves; staff create
    /// Approved bookings (with QR) on behalf of an owner.
    pub async fn create(
        &self,
        caller: &Caller,
        request: CreateBookingRequest,
    ) -> DomainResult<BookingOutcome> {
        request.validate()?;
        let now = self.clock.now();
        let window = TimeWindow::new(request.start, request.end)?;
        self.policy.check_window(&window, now)?;
        self.check_booking_owner(caller, request.owner_id).await?;
        if caller.role == UserRole::StationOperator {
            ensure_station_access(self.repos.as_ref(), caller, request.station_id).await?;
        }

        let _guard = self
            .locks
            .lock_slot(SlotKey::new(
                request.station_id,
                request.mode,
                request.slot_id.as_str(),
            ))
            .await;

        let station = self
            .bookable_station(request.station_id, request.mode, &request.slot_id)
            .await?;
        self.ensure_slot_free(&ConflictQuery::new(
            request.station_id,
            request.mode,
            request.slot_id.as_str(),
            window,
        ))
        .await?;

        let status = if caller.is_staff() {
            BookingStatus::Approved
        } else {
            BookingStatus::Pending
        };
        let mut booking = Booking::new(
            request.owner_id,
            request.station_id,
            request.mode,
            request.slot_id,
            window,
            status,
            now,
        );
        if issues_qr(status) {
            booking.qr_code = Some(self.qr.encode(&booking.id.to_string())?);
        }

        self.repos.bookings().insert(booking.clone()).await?;

        metrics::counter!(
            "bookings_created_total",
            "mode" => booking.mode.as_str(),
            "status" => status.as_str()
        )
        .increment(1);
        info!(
            booking_id = %booking.id,
            station = %station.code,
            slot = %booking.slot_id,
            status = %status,
            "Booking created"
        );

        Ok(BookingOutcome::new(booking, "Booking created successfully."))
    }

    /// Edit a Pending or Approved booking. Moving it (station, mode, slot or
    /// window) re-runs the conflict check with the booking itself excluded.
    pub async fn update(
        &self,
        caller: &Caller,
        booking_id: Uuid,
        request: UpdateBookingRequest,
    ) -> DomainResult<BookingOutcome> {
        request.validate()?;
        let now = self.clock.now();
        let current = self.load_authorized(caller, booking_id).await?;
        ensure_allowed(current.status, BookingAction::Edit)?;

        match request.status {
            Some(status) if !status.is_active() => {
                return Err(DomainError::Validation(
                    "Status can only be set to Pending or Approved.".into(),
                ));
            }
            Some(BookingStatus::Approved) if caller.role == UserRole::EVOwner => {
                return Err(DomainError::Forbidden(
                    "EV owners cannot approve bookings.".into(),
                ));
            }
            Some(_) => {}
            None if caller.role == UserRole::EVOwner => {
                self.policy
                    .check_modifiable(current.window.start, now, "updated")?;
            }
            None => {}
        }
        let target_status = request.status.unwrap_or(if caller.is_staff() {
            BookingStatus::Approved
        } else {
            BookingStatus::Pending
        });

        let station_id = request.station_id.unwrap_or(current.station_id);
        let mode = request.mode.unwrap_or(current.mode);
        let slot_id = request.slot_id.unwrap_or_else(|| current.slot_id.clone());
        let window = TimeWindow::new(
            request.start.unwrap_or(current.window.start),
            request.end.unwrap_or(current.window.end),
        )?;
        let moves = station_id != current.station_id
            || mode != current.mode
            || slot_id != current.slot_id
            || window != current.window;

        if moves {
            self.policy.check_window(&window, now)?;
            if station_id != current.station_id && caller.role == UserRole::StationOperator {
                ensure_station_access(self.repos.as_ref(), caller, station_id).await?;
            }
        }

        // Hold both the slot being left and the one being entered, then
        // re-read: a placement decided on a stale read must not be written.
        let _guard = self
            .locks
            .lock_slots(vec![
                SlotKey::new(current.station_id, current.mode, current.slot_id.as_str()),
                SlotKey::new(station_id, mode, slot_id.as_str()),
            ])
            .await;
        match self.repos.bookings().find_by_id(booking_id).await? {
            Some(fresh) if fresh.same_revision(&current) => {}
            _ => return Err(self.lost_race(booking_id, BookingAction::Edit).await),
        }

        if moves {
            self.bookable_station(station_id, mode, &slot_id).await?;
            self.ensure_slot_free(
                &ConflictQuery::new(station_id, mode, slot_id.as_str(), window)
                    .excluding(booking_id),
            )
            .await?;
        }

        let mut updated = current.clone();
        updated.station_id = station_id;
        updated.mode = mode;
        updated.slot_id = slot_id;
        updated.window = window;
        updated.status = target_status;
        updated.qr_code = if issues_qr(target_status) {
            Some(self.qr.encode(&booking_id.to_string())?)
        } else {
            None
        };
        updated.updated_at = now;

        let replaced = self
            .repos
            .bookings()
            .replace_if_unchanged(updated.clone(), &current)
            .await?;
        if !replaced {
            return Err(self.lost_race(booking_id, BookingAction::Edit).await);
        }

        if target_status != current.status {
            metrics::counter!("booking_transitions_total", "to" => target_status.as_str())
                .increment(1);
        }
        info!(
            booking_id = %booking_id,
            moved = moves,
            status = %target_status,
            "Booking updated"
        );

        Ok(BookingOutcome::new(updated, "Booking updated successfully."))
    }

    /// Pending → Approved, issuing a fresh QR code.
    pub async fn approve(&self, caller: &Caller, booking_id: Uuid) -> DomainResult<BookingOutcome> {
        if !caller.is_staff() {
            return Err(DomainError::Forbidden(
                "Only staff can approve bookings.".into(),
            ));
        }
        let booking = self.load_authorized(caller, booking_id).await?;
        self.transition(booking, BookingAction::Approve, "Booking approved successfully.")
            .await
    }

    /// Approved → Completed, by an operator of the booking's station.
    pub async fn finalize(
        &self,
        caller: &Caller,
        booking_id: Uuid,
    ) -> DomainResult<BookingOutcome> {
        if caller.role != UserRole::StationOperator {
            return Err(DomainError::Forbidden(
                "Only station operators can finalize bookings.".into(),
            ));
        }
        let booking = self.load_authorized(caller, booking_id).await?;
        self.transition(booking, BookingAction::Finalize, "Booking completed successfully.")
            .await
    }

    /// Pending/Approved → Canceled, while the start is at least the
    /// modification cutoff away.
    pub async fn cancel(&self, caller: &Caller, booking_id: Uuid) -> DomainResult<BookingOutcome> {
        let booking = self.load_authorized(caller, booking_id).await?;
        ensure_allowed(booking.status, BookingAction::Cancel)?;
        self.policy
            .check_modifiable(booking.window.start, self.clock.now(), "cancelled")?;
        self.transition(booking, BookingAction::Cancel, "Booking cancelled successfully.")
            .await
    }

    /// Remove a Completed or Canceled booking.
    pub async fn delete(&self, caller: &Caller, booking_id: Uuid) -> DomainResult<()> {
        if !caller.is_staff() {
            return Err(DomainError::Forbidden(
                "Only staff can delete bookings.".into(),
            ));
        }
        let booking = self.load_authorized(caller, booking_id).await?;
        ensure_allowed(booking.status, BookingAction::Delete)?;

        if !self.repos.bookings().delete(booking_id).await? {
            return Err(DomainError::not_found("Booking", booking_id));
        }
        info!(booking_id = %booking_id, status = %booking.status, "Booking deleted");
        Ok(())
    }

    // ── Queries ─────────────────────────────────────────────────

    pub async fn get(&self, caller: &Caller, booking_id: Uuid) -> DomainResult<BookingDetails> {
        let booking = self.load_authorized(caller, booking_id).await?;
        self.single_details(booking).await
    }

    /// Booking with the owner's contact and vehicle, for staff.
    pub async fn operator_view(
        &self,
        caller: &Caller,
        booking_id: Uuid,
    ) -> DomainResult<OperatorBookingView> {
        if !caller.is_staff() {
            return Err(DomainError::Forbidden(ACCESS_DENIED.into()));
        }
        let booking = self.load_authorized(caller, booking_id).await?;
        self.operator_details(booking).await
    }

    /// Check a scanned QR payload (the booking id) at the station.
    /// Only Approved bookings validate.
    pub async fn validate_qr(
        &self,
        caller: &Caller,
        payload: &str,
    ) -> DomainResult<OperatorBookingView> {
        if !caller.is_staff() {
            return Err(DomainError::Forbidden(
                "Only staff can validate booking codes.".into(),
            ));
        }
        let booking_id = parse_id("booking", payload)?;
        let booking = self.load_authorized(caller, booking_id).await?;
        if booking.status != BookingStatus::Approved {
            return Err(DomainError::Conflict(format!(
                "Only approved bookings can be validated; this booking is {}.",
                booking.status
            )));
        }
        info!(booking_id = %booking_id, operator = %caller.user_id, "Booking code validated");
        self.operator_details(booking).await
    }

    /// Owners see their own bookings; operators see the owner's bookings at
    /// their station; Backoffice sees all of them.
    pub async fn list_for_owner(
        &self,
        caller: &Caller,
        owner_id: Uuid,
    ) -> DomainResult<Vec<BookingDetails>> {
        let bookings = self.repos.bookings().find_by_owner(owner_id).await?;
        let visible = match caller.role {
            UserRole::Backoffice => bookings,
            UserRole::EVOwner if caller.user_id == owner_id => bookings,
            UserRole::EVOwner => return Err(DomainError::Forbidden(ACCESS_DENIED.into())),
            UserRole::StationOperator => {
                let station = assigned_station(self.repos.as_ref(), caller).await?;
                bookings
                    .into_iter()
                    .filter(|b| Some(b.station_id) == station)
                    .collect()
            }
        };
        self.describe(visible).await
    }

    pub async fn list_for_station(
        &self,
        caller: &Caller,
        station_id: Uuid,
    ) -> DomainResult<Vec<BookingDetails>> {
        ensure_station_access(self.repos.as_ref(), caller, station_id).await?;
        let bookings = self.repos.bookings().find_by_station(station_id).await?;
        self.describe(bookings).await
    }

    pub async fn list_all(&self, caller: &Caller) -> DomainResult<Vec<BookingDetails>> {
        require_backoffice(caller, "list all bookings")?;
        let bookings = self.repos.bookings().find_all().await?;
        self.describe(bookings).await
    }

    // ── Internals ───────────────────────────────────────────────

    /// Missing and foreign bookings look the same to everyone except
    /// Backoffice, so ids cannot be probed.
    async fn load_authorized(&self, caller: &Caller, booking_id: Uuid) -> DomainResult<Booking> {
        let Some(booking) = self.repos.bookings().find_by_id(booking_id).await? else {
            return Err(if caller.is_backoffice() {
                DomainError::not_found("Booking", booking_id)
            } else {
                DomainError::Forbidden(ACCESS_DENIED.into())
            });
        };

        let allowed = match caller.role {
            UserRole::Backoffice => true,
            UserRole::EVOwner => booking.owner_id == caller.user_id,
            UserRole::StationOperator => {
                assigned_station(self.repos.as_ref(), caller).await? == Some(booking.station_id)
            }
        };
        if !allowed {
            warn!(booking_id = %booking_id, caller = %caller.user_id, role = %caller.role, "Booking access denied");
            return Err(DomainError::Forbidden(ACCESS_DENIED.into()));
        }
        Ok(booking)
    }

    async fn check_booking_owner(&self, caller: &Caller, owner_id: Uuid) -> DomainResult<()> {
        if caller.role == UserRole::EVOwner && caller.user_id != owner_id {
            return Err(DomainError::Forbidden(
                "EV owners can only book for themselves.".into(),
            ));
        }
        let owner = self
            .repos
            .users()
            .find_by_id(owner_id)
            .await?
            .ok_or(DomainError::NotFound {
                entity: "EV owner",
                field: "id",
                value: owner_id.to_string(),
            })?;
        if owner.role != UserRole::EVOwner {
            return Err(DomainError::Validation(
                "Bookings can only be made for EV owner accounts.".into(),
            ));
        }
        if !owner.is_active {
            return Err(DomainError::Forbidden(
                "EV owner account is deactivated.".into(),
            ));
        }
        Ok(())
    }

    /// Station must exist, be Active and list `slot_id` for `mode`.
    async fn bookable_station(
        &self,
        station_id: Uuid,
        mode: ChargingMode,
        slot_id: &str,
    ) -> DomainResult<Station> {
        let station = self
            .repos
            .stations()
            .find_by_id(station_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Station", station_id))?;
        if !station.is_active() {
            return Err(DomainError::Conflict(format!(
                "Station {} is not active.",
                station.code
            )));
        }
        if !station.has_slot(mode, slot_id) {
            return Err(DomainError::Validation(format!(
                "Slot {} is not part of the station's {} inventory.",
                slot_id, mode
            )));
        }
        Ok(station)
    }

    async fn ensure_slot_free(&self, query: &ConflictQuery) -> DomainResult<()> {
        if self.repos.bookings().count_conflicts(query).await? > 0 {
            metrics::counter!("booking_conflicts_total", "mode" => query.mode.as_str())
                .increment(1);
            info!(
                station_id = %query.station_id,
                slot = %query.slot_id,
                "Slot unavailable for requested window"
            );
            return Err(DomainError::Conflict(format!(
                "Slot {} is not available for the selected time.",
                query.slot_id
            )));
        }
        Ok(())
    }

    async fn transition(
        &self,
        booking: Booking,
        action: BookingAction,
        message: &str,
    ) -> DomainResult<BookingOutcome> {
        ensure_allowed(booking.status, action)?;
        let Some(to) = action.target() else {
            return Err(DomainError::Validation(format!(
                "Action {} has no target status",
                action.as_str()
            )));
        };
        let qr_code = if issues_qr(to) {
            Some(self.qr.encode(&booking.id.to_string())?)
        } else {
            None
        };
        let now = self.clock.now();

        let moved = self
            .repos
            .bookings()
            .transition_status(booking.id, action.allowed_from(), to, qr_code.clone(), now)
            .await?;
        if !moved {
            return Err(self.lost_race(booking.id, action).await);
        }

        metrics::counter!("booking_transitions_total", "to" => to.as_str()).increment(1);
        info!(booking_id = %booking.id, from = %booking.status, to = %to, "Booking status changed");

        let mut updated = booking;
        updated.status = to;
        updated.qr_code = qr_code;
        updated.updated_at = now;
        Ok(BookingOutcome::new(updated, message))
    }

    /// Error for a compare-and-set that found the booking already moved on.
    async fn lost_race(&self, booking_id: Uuid, action: BookingAction) -> DomainError {
        match self.repos.bookings().find_by_id(booking_id).await {
            Ok(Some(current)) => ensure_allowed(current.status, action).err().unwrap_or_else(|| {
                DomainError::Conflict("Booking was modified concurrently; try again.".into())
            }),
            Ok(None) => DomainError::not_found("Booking", booking_id),
            Err(e) => e,
        }
    }

    async fn single_details(&self, booking: Booking) -> DomainResult<BookingDetails> {
        let booking_id = booking.id;
        self.describe(vec![booking])
            .await?
            .pop()
            .ok_or_else(|| DomainError::not_found("Booking", booking_id))
    }

    async fn operator_details(&self, booking: Booking) -> DomainResult<OperatorBookingView> {
        let profile = self.repos.owners().find_by_user_id(booking.owner_id).await?;
        let details = self.single_details(booking).await?;
        Ok(OperatorBookingView {
            details,
            owner_phone: profile.as_ref().map(|p| p.phone.clone()),
            vehicle_model: profile.as_ref().and_then(|p| p.vehicle_model.clone()),
            license_plate: profile.and_then(|p| p.license_plate),
        })
    }

    /// Join bookings with their owners and stations in three batch reads.
    async fn describe(&self, bookings: Vec<Booking>) -> DomainResult<Vec<BookingDetails>> {
        let mut owner_ids: Vec<Uuid> = bookings.iter().map(|b| b.owner_id).collect();
        owner_ids.sort();
        owner_ids.dedup();
        let mut station_ids: Vec<Uuid> = bookings.iter().map(|b| b.station_id).collect();
        station_ids.sort();
        station_ids.dedup();

        let users: HashMap<Uuid, User> = self
            .repos
            .users()
            .find_many(&owner_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();
        let profiles: HashMap<Uuid, OwnerProfile> = self
            .repos
            .owners()
            .find_many_by_user_ids(&owner_ids)
            .await?
            .into_iter()
            .map(|p| (p.user_id, p))
            .collect();
        let stations: HashMap<Uuid, Station> = self
            .repos
            .stations()
            .find_many(&station_ids)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        Ok(bookings
            .into_iter()
            .map(|booking| {
                let user = users.get(&booking.owner_id);
                let profile = profiles.get(&booking.owner_id);
                let station = stations.get(&booking.station_id);
                if user.is_none() || station.is_none() {
                    warn!(
                        booking_id = %booking.id,
                        owner_found = user.is_some(),
                        station_found = station.is_some(),
                        integrity = true,
                        "Booking references missing records"
                    );
                }
                BookingDetails {
                    owner_name: profile
                        .map(|p| p.full_name.clone())
                        .or_else(|| user.map(|u| u.full_name.clone())),
                    owner_nic: profile.map(|p| p.nic.clone()),
                    station_name: station.map(|s| s.name.clone()),
                    station_code: station.map(|s| s.code.clone()),
                    starts_at_local: self.zone.to_local(booking.window.start),
                    ends_at_local: self.zone.to_local(booking.window.end),
                    booking,
                }
            })
            .collect())
    }
}
