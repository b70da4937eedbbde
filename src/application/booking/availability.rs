//! Availability queries
//!
//! Two views with different policies:
//! - slot-set: which slot ids are free for an exact window (per-slot overlap);
//! - calendar buckets: for each bucket of a local day, whether fewer bookings
//!   start exactly at the bucket start than the station has slots for the mode.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

use super::policy::BookingPolicy;
use super::views::{DayAvailability, SlotAvailability, TimeBucket};
use crate::domain::booking::{ChargingMode, TimeWindow};
use crate::domain::{RepositoryProvider, Station};
use crate::shared::{DomainError, DomainResult, PresentationZone, SharedClock};

pub struct AvailabilityService {
    repos: Arc<dyn RepositoryProvider>,
    clock: SharedClock,
    policy: BookingPolicy,
    zone: PresentationZone,
}

impl AvailabilityService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        clock: SharedClock,
        policy: BookingPolicy,
        zone: PresentationZone,
    ) -> Self {
        Self {
            repos,
            clock,
            policy,
            zone,
        }
    }

    async fn active_station(&self, station_id: Uuid) -> DomainResult<Station> {
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
        Ok(station)
    }

    /// Slots of `mode` with no active booking overlapping `[start, end)`.
    pub async fn available_slot_ids(
        &self,
        station_id: Uuid,
        mode: ChargingMode,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<SlotAvailability> {
        let window = TimeWindow::new(start, end)?;
        self.policy.check_advance(&window, self.clock.now())?;
        let station = self.active_station(station_id).await?;

        let booked = self
            .repos
            .bookings()
            .booked_slot_ids(station_id, mode, &window)
            .await?;
        let available: Vec<String> = station
            .slots_for(mode)
            .iter()
            .filter(|slot| !booked.contains(slot))
            .cloned()
            .collect();

        let message = if available.is_empty() {
            format!("No available {} slots for the selected time.", mode)
        } else {
            format!("Found {} available {} slots.", available.len(), mode)
        };
        debug!(station_id = %station_id, mode = %mode, free = available.len(), "Slot availability computed");

        Ok(SlotAvailability {
            station_id,
            mode,
            window,
            available_slot_ids: available,
            booked_slot_ids: booked,
            message,
        })
    }

    /// Calendar view of one local day. Buckets already over are left out.
    pub async fn available_buckets(
        &self,
        station_id: Uuid,
        mode: ChargingMode,
        date: NaiveDate,
    ) -> DomainResult<DayAvailability> {
        let now = self.clock.now();
        let today = self.zone.local_date(now);
        let last_day = today + Duration::days(self.policy.max_advance_days());
        if date < today || date > last_day {
            return Err(DomainError::Validation(format!(
                "Date must be between today and {} days from today.",
                self.policy.max_advance_days()
            )));
        }

        let station = self.active_station(station_id).await?;
        let capacity = station.capacity_for(mode);
        let (day_start, day_end) = self.zone.day_bounds(date);

        let mut starts: HashMap<DateTime<Utc>, u32> = HashMap::new();
        for booking in self
            .repos
            .bookings()
            .find_active_starting_between(station_id, mode, day_start, day_end)
            .await?
        {
            *starts.entry(booking.window.start).or_default() += 1;
        }

        let step = self.policy.bucket.max(Duration::minutes(1));
        let mut buckets = Vec::new();
        let mut bucket_start = day_start;
        while bucket_start < day_end {
            let bucket_end = (bucket_start + step).min(day_end);
            if bucket_end > now {
                let booked = starts.get(&bucket_start).copied().unwrap_or(0);
                buckets.push(TimeBucket {
                    start: bucket_start,
                    end: bucket_end,
                    local_start: self.zone.to_local(bucket_start),
                    booked,
                    available: booked < capacity,
                });
            }
            bucket_start = bucket_end;
        }

        Ok(DayAvailability {
            station_id,
            mode,
            date,
            capacity,
            buckets,
        })
    }
}
