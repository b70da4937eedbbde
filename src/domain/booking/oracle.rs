//! Overlap oracle
//!
//! Decides whether a slot is free for a window against a set of bookings.
//! Store adapters either call [`conflicts_with`] directly (in-memory) or
//! express the same predicate as a query filter (SQL); both must agree
//! with this module.

use uuid::Uuid;

use super::model::{Booking, ChargingMode, TimeWindow};

/// "Is slot `slot_id` at `station_id` free for `window`?"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictQuery {
    pub station_id: Uuid,
    pub mode: ChargingMode,
    pub slot_id: String,
    pub window: TimeWindow,
    /// Booking ignored by the check, used when a booking is edited in place
    pub exclude: Option<Uuid>,
}

impl ConflictQuery {
    pub fn new(
        station_id: Uuid,
        mode: ChargingMode,
        slot_id: impl Into<String>,
        window: TimeWindow,
    ) -> Self {
        Self {
            station_id,
            mode,
            slot_id: slot_id.into(),
            window,
            exclude: None,
        }
    }

    pub fn excluding(mut self, booking_id: Uuid) -> Self {
        self.exclude = Some(booking_id);
        self
    }
}

/// Existing booking blocks the query iff it is still active, sits on the
/// same station/mode/slot, is not the excluded booking and its window
/// overlaps (`existing.start < new.end && existing.end > new.start`).
pub fn conflicts_with(existing: &Booking, query: &ConflictQuery) -> bool {
    existing.is_active()
        && existing.station_id == query.station_id
        && existing.mode == query.mode
        && existing.slot_id == query.slot_id
        && query.exclude != Some(existing.id)
        && existing.window.overlaps(&query.window)
}

pub fn count_conflicts<'a, I>(bookings: I, query: &ConflictQuery) -> u64
where
    I: IntoIterator<Item = &'a Booking>,
{
    bookings
        .into_iter()
        .filter(|b| conflicts_with(b, query))
        .count() as u64
}

/// Distinct slot ids with at least one active booking overlapping `window`.
pub fn booked_slot_ids<'a, I>(
    bookings: I,
    station_id: Uuid,
    mode: ChargingMode,
    window: &TimeWindow,
) -> Vec<String>
where
    I: IntoIterator<Item = &'a Booking>,
{
    let mut slots: Vec<String> = bookings
        .into_iter()
        .filter(|b| {
            b.is_active()
                && b.station_id == station_id
                && b.mode == mode
                && b.window.overlaps(window)
        })
        .map(|b| b.slot_id.clone())
        .collect();
    slots.sort();
    slots.dedup();
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::BookingStatus;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 0, 0, 0).unwrap()
    }

    fn window(a: i64, b: i64) -> TimeWindow {
        TimeWindow::new(base() + Duration::minutes(a), base() + Duration::minutes(b)).unwrap()
    }

    fn booking(station: Uuid, slot: &str, w: TimeWindow, status: BookingStatus) -> Booking {
        Booking::new(
            Uuid::new_v4(),
            station,
            ChargingMode::Ac,
            slot,
            w,
            status,
            base(),
        )
    }

    #[test]
    fn matches_interval_formula_for_all_pairs() {
        let station = Uuid::new_v4();
        // Every pair of intervals on a small grid, including touching ones.
        for a in 0..6 {
            for b in (a + 1)..7 {
                let existing = booking(station, "A1", window(a, b), BookingStatus::Pending);
                for c in 0..6 {
                    for d in (c + 1)..7 {
                        let query =
                            ConflictQuery::new(station, ChargingMode::Ac, "A1", window(c, d));
                        assert_eq!(
                            conflicts_with(&existing, &query),
                            a < d && b > c,
                            "[{a},{b}) vs [{c},{d})"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn terminal_bookings_never_conflict() {
        let station = Uuid::new_v4();
        let query = ConflictQuery::new(station, ChargingMode::Ac, "A1", window(0, 60));
        for status in [BookingStatus::Canceled, BookingStatus::Completed] {
            let b = booking(station, "A1", window(0, 60), status);
            assert!(!conflicts_with(&b, &query));
        }
    }

    #[test]
    fn other_slot_mode_or_station_do_not_conflict() {
        let station = Uuid::new_v4();
        let query = ConflictQuery::new(station, ChargingMode::Ac, "A1", window(0, 60));

        let other_slot = booking(station, "A2", window(0, 60), BookingStatus::Approved);
        let other_station = booking(Uuid::new_v4(), "A1", window(0, 60), BookingStatus::Approved);
        let mut other_mode = booking(station, "A1", window(0, 60), BookingStatus::Approved);
        other_mode.mode = ChargingMode::Dc;

        assert_eq!(
            count_conflicts([&other_slot, &other_station, &other_mode], &query),
            0
        );
    }

    #[test]
    fn excluded_booking_is_ignored() {
        let station = Uuid::new_v4();
        let existing = booking(station, "A1", window(0, 60), BookingStatus::Approved);
        let query = ConflictQuery::new(station, ChargingMode::Ac, "A1", window(30, 90));
        assert!(conflicts_with(&existing, &query));
        assert!(!conflicts_with(&existing, &query.excluding(existing.id)));
    }

    #[test]
    fn booked_slot_ids_are_distinct() {
        let station = Uuid::new_v4();
        let bookings = vec![
            booking(station, "A2", window(0, 30), BookingStatus::Pending),
            booking(station, "A2", window(30, 60), BookingStatus::Approved),
            booking(station, "A1", window(0, 60), BookingStatus::Canceled),
            booking(station, "A3", window(60, 90), BookingStatus::Approved),
        ];
        let booked = booked_slot_ids(&bookings, station, ChargingMode::Ac, &window(0, 60));
        assert_eq!(booked, vec!["A2".to_string()]);
    }
}
