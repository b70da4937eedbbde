//! In-memory repositories for development and testing
//!
//! Each collection is a `DashMap`; single-document operations (insert,
//! replace, status compare-and-set) hold the entry's shard lock for their
//! whole read-modify-write and are therefore atomic, like a document store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::domain::booking::{oracle, ConflictQuery};
use crate::domain::{
    Booking, BookingRepository, BookingStatus, ChargingMode, OwnerProfile,
    OwnerProfileRepository, RepositoryProvider, Station, StationRepository, StationStatus,
    TimeWindow, User, UserRepository, UserRole,
};
use crate::shared::{DomainError, DomainResult};

fn newest_first<T, F>(mut items: Vec<T>, created_at: F) -> Vec<T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    items
}

// ── Bookings ────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryBookingRepository {
    bookings: DashMap<Uuid, Booking>,
}

impl InMemoryBookingRepository {
    fn collect<F>(&self, keep: F) -> Vec<Booking>
    where
        F: Fn(&Booking) -> bool,
    {
        self.bookings
            .iter()
            .filter(|e| keep(e.value()))
            .map(|e| e.value().clone())
            .collect()
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn insert(&self, booking: Booking) -> DomainResult<()> {
        match self.bookings.entry(booking.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(DomainError::Conflict(format!(
                "Booking {} already exists",
                booking.id
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(booking);
                Ok(())
            }
        }
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Booking>> {
        Ok(self.bookings.get(&id).map(|b| b.clone()))
    }

    async fn replace_if_unchanged(&self, booking: Booking, seen: &Booking) -> DomainResult<bool> {
        match self.bookings.get_mut(&booking.id) {
            Some(mut current) if current.same_revision(seen) => {
                *current = booking;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: &[BookingStatus],
        to: BookingStatus,
        qr_code: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        match self.bookings.get_mut(&id) {
            Some(mut current) if from.contains(&current.status) => {
                current.status = to;
                current.qr_code = qr_code;
                current.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> DomainResult<bool> {
        Ok(self.bookings.remove(&id).is_some())
    }

    async fn count_conflicts(&self, query: &ConflictQuery) -> DomainResult<u64> {
        Ok(self
            .bookings
            .iter()
            .filter(|e| oracle::conflicts_with(e.value(), query))
            .count() as u64)
    }

    async fn booked_slot_ids(
        &self,
        station_id: Uuid,
        mode: ChargingMode,
        window: &TimeWindow,
    ) -> DomainResult<Vec<String>> {
        let candidates = self.collect(|b| b.station_id == station_id);
        Ok(oracle::booked_slot_ids(&candidates, station_id, mode, window))
    }

    async fn find_active_starting_between(
        &self,
        station_id: Uuid,
        mode: ChargingMode,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<Booking>> {
        Ok(self.collect(|b| {
            b.is_active()
                && b.station_id == station_id
                && b.mode == mode
                && b.window.start >= from
                && b.window.start < to
        }))
    }

    async fn find_active_for_station(&self, station_id: Uuid) -> DomainResult<Vec<Booking>> {
        Ok(self.collect(|b| b.is_active() && b.station_id == station_id))
    }

    async fn find_by_owner(&self, owner_id: Uuid) -> DomainResult<Vec<Booking>> {
        Ok(newest_first(
            self.collect(|b| b.owner_id == owner_id),
            |b| b.created_at,
        ))
    }

    async fn find_by_station(&self, station_id: Uuid) -> DomainResult<Vec<Booking>> {
        Ok(newest_first(
            self.collect(|b| b.station_id == station_id),
            |b| b.created_at,
        ))
    }

    async fn find_all(&self) -> DomainResult<Vec<Booking>> {
        Ok(newest_first(self.collect(|_| true), |b| b.created_at))
    }

    async fn find_upcoming_for_stations(
        &self,
        station_ids: &[Uuid],
        after: DateTime<Utc>,
    ) -> DomainResult<Vec<Booking>> {
        let mut upcoming = self.collect(|b| {
            b.is_active() && station_ids.contains(&b.station_id) && b.window.start > after
        });
        upcoming.sort_by_key(|b| b.window.start);
        Ok(upcoming)
    }

    async fn count_by_status(
        &self,
        status: BookingStatus,
        starting_after: Option<DateTime<Utc>>,
    ) -> DomainResult<u64> {
        Ok(self
            .bookings
            .iter()
            .filter(|e| {
                e.status == status && starting_after.map_or(true, |t| e.window.start > t)
            })
            .count() as u64)
    }

    async fn count_active_starting_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<u64> {
        Ok(self
            .bookings
            .iter()
            .filter(|e| e.is_active() && e.window.start >= from && e.window.start < to)
            .count() as u64)
    }
}

// ── Stations ────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryStationRepository {
    stations: DashMap<Uuid, Station>,
}

#[async_trait]
impl StationRepository for InMemoryStationRepository {
    async fn insert(&self, station: Station) -> DomainResult<()> {
        if self.stations.contains_key(&station.id) {
            return Err(DomainError::Conflict(format!(
                "Station {} already exists",
                station.id
            )));
        }
        self.stations.insert(station.id, station);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Station>> {
        Ok(self.stations.get(&id).map(|s| s.clone()))
    }

    async fn find_many(&self, ids: &[Uuid]) -> DomainResult<Vec<Station>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.stations.get(id).map(|s| s.clone()))
            .collect())
    }

    async fn find_all(&self) -> DomainResult<Vec<Station>> {
        let mut all: Vec<Station> = self.stations.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn find_by_status(&self, status: StationStatus) -> DomainResult<Vec<Station>> {
        let mut matching: Vec<Station> = self
            .stations
            .iter()
            .filter(|e| e.status == status)
            .map(|e| e.value().clone())
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matching)
    }

    async fn update(&self, station: Station) -> DomainResult<bool> {
        match self.stations.get_mut(&station.id) {
            Some(mut current) => {
                *current = station;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_by_status(&self, status: StationStatus) -> DomainResult<u64> {
        Ok(self.stations.iter().filter(|e| e.status == status).count() as u64)
    }

    async fn count_all(&self) -> DomainResult<u64> {
        Ok(self.stations.len() as u64)
    }

    async fn find_by_operator(&self, user_id: Uuid) -> DomainResult<Option<Station>> {
        Ok(self
            .stations
            .iter()
            .find(|e| e.has_operator(user_id))
            .map(|e| e.value().clone()))
    }

    async fn assigned_operator_ids(&self) -> DomainResult<Vec<Uuid>> {
        let mut ids: Vec<Uuid> = self
            .stations
            .iter()
            .flat_map(|e| e.operator_ids.clone())
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

// ── Owner profiles ──────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryOwnerProfileRepository {
    profiles: DashMap<Uuid, OwnerProfile>,
}

#[async_trait]
impl OwnerProfileRepository for InMemoryOwnerProfileRepository {
    async fn insert(&self, profile: OwnerProfile) -> DomainResult<()> {
        if self.profiles.iter().any(|e| e.nic == profile.nic) {
            return Err(DomainError::Conflict(format!(
                "Profile with NIC {} already exists",
                profile.nic
            )));
        }
        self.profiles.insert(profile.id, profile);
        Ok(())
    }

    async fn find_by_nic(&self, nic: &str) -> DomainResult<Option<OwnerProfile>> {
        Ok(self
            .profiles
            .iter()
            .find(|e| e.nic == nic)
            .map(|e| e.value().clone()))
    }

    async fn find_by_user_id(&self, user_id: Uuid) -> DomainResult<Option<OwnerProfile>> {
        Ok(self
            .profiles
            .iter()
            .find(|e| e.user_id == user_id)
            .map(|e| e.value().clone()))
    }

    async fn find_many_by_user_ids(&self, user_ids: &[Uuid]) -> DomainResult<Vec<OwnerProfile>> {
        Ok(self
            .profiles
            .iter()
            .filter(|e| user_ids.contains(&e.user_id))
            .map(|e| e.value().clone())
            .collect())
    }

    async fn find_all(&self) -> DomainResult<Vec<OwnerProfile>> {
        Ok(newest_first(
            self.profiles.iter().map(|e| e.value().clone()).collect(),
            |p| p.created_at,
        ))
    }

    async fn update(&self, profile: OwnerProfile) -> DomainResult<bool> {
        match self.profiles.get_mut(&profile.id) {
            Some(mut current) => {
                *current = profile;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_nic(&self, nic: &str) -> DomainResult<bool> {
        let id = self.profiles.iter().find(|e| e.nic == nic).map(|e| *e.key());
        Ok(match id {
            Some(id) => self.profiles.remove(&id).is_some(),
            None => false,
        })
    }
}

// ── Users ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: DashMap<Uuid, User>,
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn insert(&self, user: User) -> DomainResult<()> {
        if self
            .users
            .iter()
            .any(|e| e.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(DomainError::Conflict(format!(
                "User with email {} already exists",
                user.email
            )));
        }
        self.users.insert(user.id, user);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|e| e.email.eq_ignore_ascii_case(email))
            .map(|e| e.value().clone()))
    }

    async fn find_many(&self, ids: &[Uuid]) -> DomainResult<Vec<User>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.users.get(id).map(|u| u.clone()))
            .collect())
    }

    async fn find_by_role(&self, role: UserRole) -> DomainResult<Vec<User>> {
        Ok(newest_first(
            self.users
                .iter()
                .filter(|e| e.role == role)
                .map(|e| e.value().clone())
                .collect(),
            |u| u.created_at,
        ))
    }

    async fn count(&self) -> DomainResult<u64> {
        Ok(self.users.len() as u64)
    }

    async fn update(&self, user: User) -> DomainResult<bool> {
        match self.users.get_mut(&user.id) {
            Some(mut current) => {
                *current = user;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> DomainResult<bool> {
        Ok(self.users.remove(&id).is_some())
    }
}

// ── Provider ────────────────────────────────────────────────────

/// Repository provider holding every collection in process memory
#[derive(Default)]
pub struct InMemoryRepositoryProvider {
    bookings: InMemoryBookingRepository,
    stations: InMemoryStationRepository,
    owners: InMemoryOwnerProfileRepository,
    users: InMemoryUserRepository,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RepositoryProvider for InMemoryRepositoryProvider {
    fn bookings(&self) -> &dyn BookingRepository {
        &self.bookings
    }

    fn stations(&self) -> &dyn StationRepository {
        &self.stations
    }

    fn owners(&self) -> &dyn OwnerProfileRepository {
        &self.owners
    }

    fn users(&self) -> &dyn UserRepository {
        &self.users
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, h, 0, 0).unwrap()
    }

    fn booking(station: Uuid, slot: &str, from: u32, to: u32) -> Booking {
        Booking::new(
            Uuid::new_v4(),
            station,
            ChargingMode::Ac,
            slot,
            TimeWindow::new(t(from), t(to)).unwrap(),
            BookingStatus::Pending,
            t(0),
        )
    }

    #[tokio::test]
    async fn transition_is_compare_and_set() {
        let repo = InMemoryBookingRepository::default();
        let b = booking(Uuid::new_v4(), "A1", 10, 11);
        let id = b.id;
        repo.insert(b).await.unwrap();

        let approved = repo
            .transition_status(
                id,
                &[BookingStatus::Pending],
                BookingStatus::Approved,
                Some("qr".into()),
                t(1),
            )
            .await
            .unwrap();
        assert!(approved);

        // A second approve sees Approved, not Pending, and loses.
        let again = repo
            .transition_status(id, &[BookingStatus::Pending], BookingStatus::Approved, None, t(2))
            .await
            .unwrap();
        assert!(!again);

        let stored = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Approved);
        assert_eq!(stored.qr_code.as_deref(), Some("qr"));
        assert_eq!(stored.updated_at, t(1));
    }

    #[tokio::test]
    async fn replace_refuses_a_stale_revision() {
        let repo = InMemoryBookingRepository::default();
        let b = booking(Uuid::new_v4(), "A1", 10, 11);
        repo.insert(b.clone()).await.unwrap();

        // Someone moves the booking to A2 without touching its status.
        let mut moved = b.clone();
        moved.slot_id = "A2".into();
        assert!(repo.replace_if_unchanged(moved.clone(), &b).await.unwrap());

        // A write based on the A1 revision must not land.
        let mut stale = b.clone();
        stale.status = BookingStatus::Approved;
        assert!(!repo.replace_if_unchanged(stale, &b).await.unwrap());

        let stored = repo.find_by_id(b.id).await.unwrap().unwrap();
        assert_eq!(stored.slot_id, "A2");
        assert_eq!(stored.status, BookingStatus::Pending);

        let canceled = repo
            .transition_status(b.id, &BookingStatus::ACTIVE, BookingStatus::Canceled, None, t(0))
            .await
            .unwrap();
        assert!(canceled);
        assert!(!repo.replace_if_unchanged(moved.clone(), &moved).await.unwrap());
    }

    #[tokio::test]
    async fn day_query_uses_start_instant() {
        let repo = InMemoryBookingRepository::default();
        let station = Uuid::new_v4();
        repo.insert(booking(station, "A1", 9, 10)).await.unwrap();
        repo.insert(booking(station, "A2", 12, 13)).await.unwrap();

        let found = repo
            .find_active_starting_between(
                station,
                ChargingMode::Ac,
                t(10),
                t(0) + Duration::days(1),
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].slot_id, "A2");
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let repo = InMemoryUserRepository::default();
        repo.insert(User::new("a@ev.lk", "A", "h", UserRole::EVOwner, t(0)))
            .await
            .unwrap();
        let err = repo
            .insert(User::new("A@EV.lk", "B", "h", UserRole::EVOwner, t(0)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "conflict");
    }
}
