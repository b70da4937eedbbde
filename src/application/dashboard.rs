//! Backoffice dashboard figures

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::application::access::require_backoffice;
use crate::domain::{BookingStatus, Caller, GeoPoint, RepositoryProvider, StationStatus};
use crate::shared::{DomainResult, PresentationZone, SharedClock};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardMetrics {
    pub pending_reservations: u64,
    /// Approved bookings that have not started yet
    pub approved_future_reservations: u64,
    pub active_stations: u64,
    pub total_stations: u64,
    /// Live bookings starting on the local calendar day
    pub today_used_slots: u64,
    /// AC plus DC slots across active stations
    pub today_total_slots: u64,
    pub today_capacity_percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StationLocation {
    pub station_id: Uuid,
    pub name: String,
    pub code: String,
    pub location: GeoPoint,
    pub status: StationStatus,
}

pub struct DashboardService {
    repos: Arc<dyn RepositoryProvider>,
    clock: SharedClock,
    zone: PresentationZone,
}

impl DashboardService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        clock: SharedClock,
        zone: PresentationZone,
    ) -> Self {
        Self { repos, clock, zone }
    }

    pub async fn metrics(&self, caller: &Caller) -> DomainResult<DashboardMetrics> {
        require_backoffice(caller, "view the dashboard")?;
        let now = self.clock.now();
        let (day_start, day_end) = self.zone.day_bounds(self.zone.local_date(now));
        let bookings = self.repos.bookings();
        let stations = self.repos.stations();

        let (pending, approved_future, active_stations, total_stations, used, active) =
            tokio::try_join!(
                bookings.count_by_status(BookingStatus::Pending, None),
                bookings.count_by_status(BookingStatus::Approved, Some(now)),
                stations.count_by_status(StationStatus::Active),
                stations.count_all(),
                bookings.count_active_starting_between(day_start, day_end),
                stations.find_by_status(StationStatus::Active),
            )?;

        let total: u64 = active.iter().map(|s| u64::from(s.total_slots())).sum();
        Ok(DashboardMetrics {
            pending_reservations: pending,
            approved_future_reservations: approved_future,
            active_stations,
            total_stations,
            today_used_slots: used,
            today_total_slots: total,
            today_capacity_percentage: capacity_percentage(used, total),
        })
    }

    pub async fn active_station_locations(
        &self,
        caller: &Caller,
    ) -> DomainResult<Vec<StationLocation>> {
        require_backoffice(caller, "view station locations")?;
        Ok(self
            .repos
            .stations()
            .find_by_status(StationStatus::Active)
            .await?
            .into_iter()
            .map(|s| StationLocation {
                station_id: s.id,
                name: s.name,
                code: s.code,
                location: s.location,
                status: s.status,
            })
            .collect())
    }
}

/// Share of `total` in percent, rounded to two decimals. Zero when empty.
fn capacity_percentage(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (used as f64 / total as f64 * 10_000.0).round() / 100.0
}
