//! Booking repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::model::{Booking, BookingStatus, ChargingMode, TimeWindow};
use super::oracle::ConflictQuery;
use crate::shared::DomainResult;

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Insert a new booking
    async fn insert(&self, booking: Booking) -> DomainResult<()>;

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Booking>>;

    /// Overwrite `booking` only while the stored document is still the
    /// revision `seen` (see [`Booking::same_revision`]). Returns false when
    /// the booking is gone or was written since it was read.
    async fn replace_if_unchanged(&self, booking: Booking, seen: &Booking) -> DomainResult<bool>;

    /// Compare-and-set of the status field. `qr_code` replaces the stored
    /// QR payload, so leaving Approved clears it.
    async fn transition_status(
        &self,
        id: Uuid,
        from: &[BookingStatus],
        to: BookingStatus,
        qr_code: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<bool>;

    async fn delete(&self, id: Uuid) -> DomainResult<bool>;

    /// Active bookings on the queried slot overlapping the window
    async fn count_conflicts(&self, query: &ConflictQuery) -> DomainResult<u64>;

    /// Distinct slot ids with an active booking overlapping `window`
    async fn booked_slot_ids(
        &self,
        station_id: Uuid,
        mode: ChargingMode,
        window: &TimeWindow,
    ) -> DomainResult<Vec<String>>;

    /// Active bookings of one mode whose start lies in `[from, to)`
    async fn find_active_starting_between(
        &self,
        station_id: Uuid,
        mode: ChargingMode,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<Booking>>;

    /// Pending or Approved bookings on a station
    async fn find_active_for_station(&self, station_id: Uuid) -> DomainResult<Vec<Booking>>;

    /// Newest first
    async fn find_by_owner(&self, owner_id: Uuid) -> DomainResult<Vec<Booking>>;

    /// Newest first
    async fn find_by_station(&self, station_id: Uuid) -> DomainResult<Vec<Booking>>;

    /// Newest first
    async fn find_all(&self) -> DomainResult<Vec<Booking>>;

    /// Active bookings on any of `station_ids` starting after `after`, soonest first
    async fn find_upcoming_for_stations(
        &self,
        station_ids: &[Uuid],
        after: DateTime<Utc>,
    ) -> DomainResult<Vec<Booking>>;

    async fn count_by_status(
        &self,
        status: BookingStatus,
        starting_after: Option<DateTime<Utc>>,
    ) -> DomainResult<u64>;

    /// Active bookings (any station) starting in `[from, to)`
    async fn count_active_starting_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<u64>;
}
