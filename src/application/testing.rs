//! Shared fixtures for service tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::application::booking::{AvailabilityService, BookingPolicy, BookingService};
use crate::application::locks::SlotLockRegistry;
use crate::application::ports::QrEncoder;
use crate::application::station::StationService;
use crate::domain::booking::ConflictQuery;
use crate::domain::{
    Booking, BookingRepository, BookingStatus, Caller, ChargingMode, OwnerProfile,
    OwnerProfileRepository, RepositoryProvider, Station, StationRepository, TimeWindow, User,
    UserRepository, UserRole,
};
use crate::infrastructure::storage::{
    InMemoryBookingRepository, InMemoryOwnerProfileRepository, InMemoryRepositoryProvider,
    InMemoryStationRepository, InMemoryUserRepository,
};
use crate::shared::{DomainError, DomainResult, FixedClock, PresentationZone, SharedClock};

/// QR encoder that returns its payload, so tests can see what was encoded.
pub struct EchoQr;

impl QrEncoder for EchoQr {
    fn encode(&self, payload: &str) -> DomainResult<String> {
        Ok(format!("qr:{}", payload))
    }
}

pub struct Fixture {
    pub repos: Arc<dyn RepositoryProvider>,
    pub clock: Arc<FixedClock>,
    pub locks: Arc<SlotLockRegistry>,
    pub policy: BookingPolicy,
    pub zone: PresentationZone,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_repos(Arc::new(InMemoryRepositoryProvider::new()))
    }

    pub fn with_repos(repos: Arc<dyn RepositoryProvider>) -> Self {
        Self {
            repos,
            clock: Arc::new(FixedClock::new(
                Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap(),
            )),
            locks: Arc::new(SlotLockRegistry::new()),
            policy: BookingPolicy::default(),
            zone: PresentationZone::utc(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        use crate::shared::Clock;
        self.clock.now()
    }

    pub fn hours(&self, hours: i64) -> DateTime<Utc> {
        self.now() + Duration::hours(hours)
    }

    pub fn repos(&self) -> Arc<dyn RepositoryProvider> {
        self.repos.clone()
    }

    pub fn shared_clock(&self) -> SharedClock {
        self.clock.clone()
    }

    pub fn bookings(&self) -> BookingService {
        BookingService::new(
            self.repos(),
            self.locks.clone(),
            Arc::new(EchoQr),
            self.shared_clock(),
            self.policy,
            self.zone,
        )
    }

    pub fn availability(&self) -> AvailabilityService {
        AvailabilityService::new(self.repos(), self.shared_clock(), self.policy, self.zone)
    }

    pub fn stations(&self) -> StationService {
        StationService::new(
            self.repos(),
            self.locks.clone(),
            self.shared_clock(),
            self.zone,
        )
    }

    pub async fn station(&self, ac: u32, dc: u32) -> Station {
        let code = format!("ST-{}", &Uuid::new_v4().simple().to_string()[..6]);
        let station = Station::new("Test Station", code, ac, dc, self.now());
        self.repos.stations().insert(station.clone()).await.unwrap();
        station
    }

    async fn user(&self, role: UserRole, station: Option<Uuid>) -> User {
        let email = format!("{}@ev.test", Uuid::new_v4().simple());
        let mut user = User::new(email, "Test User", "hash", role, self.now());
        user.assigned_station_id = station;
        self.repos.users().insert(user.clone()).await.unwrap();
        user
    }

    pub async fn owner(&self) -> Caller {
        Caller::owner(self.user(UserRole::EVOwner, None).await.id)
    }

    pub async fn backoffice(&self) -> Caller {
        Caller::backoffice(self.user(UserRole::Backoffice, None).await.id)
    }

    /// Operator assigned to `station_id` on both sides of the link.
    pub async fn operator(&self, station_id: Uuid) -> Caller {
        let user = self.user(UserRole::StationOperator, Some(station_id)).await;
        let mut station = self
            .repos
            .stations()
            .find_by_id(station_id)
            .await
            .unwrap()
            .unwrap();
        station.operator_ids.push(user.id);
        self.repos.stations().update(station).await.unwrap();
        Caller::operator(user.id)
    }
}

// ── Fault injection ─────────────────────────────────────────────

fn injected() -> DomainError {
    DomainError::Storage("injected failure".into())
}

/// One-shot pause point. Once armed, the next call through [`Gate::pass`]
/// parks until [`Gate::release`]; later calls go straight through.
#[derive(Default)]
pub struct Gate {
    armed: AtomicBool,
    reached: Notify,
    release: Notify,
}

impl Gate {
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    async fn pass(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.reached.notify_one();
            self.release.notified().await;
        }
    }

    /// Wait until a call is parked at the gate.
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// Booking store whose `find_by_id` can be paused mid-request.
#[derive(Default)]
pub struct GatedBookings {
    inner: InMemoryBookingRepository,
    pub find_gate: Gate,
}

#[async_trait]
impl BookingRepository for GatedBookings {
    async fn insert(&self, booking: Booking) -> DomainResult<()> {
        self.inner.insert(booking).await
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Booking>> {
        let found = self.inner.find_by_id(id).await;
        self.find_gate.pass().await;
        found
    }

    async fn replace_if_unchanged(&self, booking: Booking, seen: &Booking) -> DomainResult<bool> {
        self.inner.replace_if_unchanged(booking, seen).await
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: &[BookingStatus],
        to: BookingStatus,
        qr_code: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        self.inner.transition_status(id, from, to, qr_code, at).await
    }

    async fn delete(&self, id: Uuid) -> DomainResult<bool> {
        self.inner.delete(id).await
    }

    async fn count_conflicts(&self, query: &ConflictQuery) -> DomainResult<u64> {
        self.inner.count_conflicts(query).await
    }

    async fn booked_slot_ids(
        &self,
        station_id: Uuid,
        mode: ChargingMode,
        window: &TimeWindow,
    ) -> DomainResult<Vec<String>> {
        self.inner.booked_slot_ids(station_id, mode, window).await
    }

    async fn find_active_starting_between(
        &self,
        station_id: Uuid,
        mode: ChargingMode,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<Booking>> {
        self.inner
            .find_active_starting_between(station_id, mode, from, to)
            .await
    }

    async fn find_active_for_station(&self, station_id: Uuid) -> DomainResult<Vec<Booking>> {
        self.inner.find_active_for_station(station_id).await
    }

    async fn find_by_owner(&self, owner_id: Uuid) -> DomainResult<Vec<Booking>> {
        self.inner.find_by_owner(owner_id).await
    }

    async fn find_by_station(&self, station_id: Uuid) -> DomainResult<Vec<Booking>> {
        self.inner.find_by_station(station_id).await
    }

    async fn find_all(&self) -> DomainResult<Vec<Booking>> {
        self.inner.find_all().await
    }

    async fn find_upcoming_for_stations(
        &self,
        station_ids: &[Uuid],
        after: DateTime<Utc>,
    ) -> DomainResult<Vec<Booking>> {
        self.inner.find_upcoming_for_stations(station_ids, after).await
    }

    async fn count_by_status(
        &self,
        status: BookingStatus,
        starting_after: Option<DateTime<Utc>>,
    ) -> DomainResult<u64> {
        self.inner.count_by_status(status, starting_after).await
    }

    async fn count_active_starting_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<u64> {
        self.inner.count_active_starting_between(from, to).await
    }
}

#[derive(Default)]
pub struct FaultyOwners {
    inner: InMemoryOwnerProfileRepository,
    pub fail_insert: AtomicBool,
    pub insert_gate: Gate,
}

#[async_trait]
impl OwnerProfileRepository for FaultyOwners {
    async fn insert(&self, profile: OwnerProfile) -> DomainResult<()> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.insert_gate.pass().await;
        self.inner.insert(profile).await
    }

    async fn find_by_nic(&self, nic: &str) -> DomainResult<Option<OwnerProfile>> {
        self.inner.find_by_nic(nic).await
    }

    async fn find_by_user_id(&self, user_id: Uuid) -> DomainResult<Option<OwnerProfile>> {
        self.inner.find_by_user_id(user_id).await
    }

    async fn find_many_by_user_ids(&self, user_ids: &[Uuid]) -> DomainResult<Vec<OwnerProfile>> {
        self.inner.find_many_by_user_ids(user_ids).await
    }

    async fn find_all(&self) -> DomainResult<Vec<OwnerProfile>> {
        self.inner.find_all().await
    }

    async fn update(&self, profile: OwnerProfile) -> DomainResult<bool> {
        self.inner.update(profile).await
    }

    async fn delete_by_nic(&self, nic: &str) -> DomainResult<bool> {
        self.inner.delete_by_nic(nic).await
    }
}

#[derive(Default)]
pub struct FaultyUsers {
    inner: InMemoryUserRepository,
    pub fail_update: AtomicBool,
    pub fail_delete: AtomicBool,
}

#[async_trait]
impl UserRepository for FaultyUsers {
    async fn insert(&self, user: User) -> DomainResult<()> {
        self.inner.insert(user).await
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<User>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>> {
        self.inner.find_by_email(email).await
    }

    async fn find_many(&self, ids: &[Uuid]) -> DomainResult<Vec<User>> {
        self.inner.find_many(ids).await
    }

    async fn find_by_role(&self, role: UserRole) -> DomainResult<Vec<User>> {
        self.inner.find_by_role(role).await
    }

    async fn count(&self) -> DomainResult<u64> {
        self.inner.count().await
    }

    async fn update(&self, user: User) -> DomainResult<bool> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.update(user).await
    }

    async fn delete(&self, id: Uuid) -> DomainResult<bool> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.delete(id).await
    }
}

/// In-memory provider with switchable failures and pause points.
#[derive(Default)]
pub struct FaultyRepos {
    pub bookings: GatedBookings,
    stations: InMemoryStationRepository,
    pub owners: FaultyOwners,
    pub users: FaultyUsers,
}

impl RepositoryProvider for FaultyRepos {
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

pub fn fail(flag: &AtomicBool, on: bool) {
    flag.store(on, Ordering::SeqCst);
}
