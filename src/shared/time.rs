//! Time sources and the presentation time zone.
//!
//! Every instant the system stores or compares is UTC. The only place a
//! local offset is applied is [`PresentationZone`], built once from
//! configuration.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type SharedClock = Arc<dyn Clock>;

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.write() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.write() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Fixed offset used to present instants and to define "calendar day".
#[derive(Debug, Clone, Copy)]
pub struct PresentationZone {
    offset: FixedOffset,
}

impl PresentationZone {
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Offsets outside +/-24h fall back to UTC.
    pub fn from_minutes(minutes: i32) -> Self {
        match FixedOffset::east_opt(minutes * 60) {
            Some(offset) => Self { offset },
            None => Self::utc(),
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn to_local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }

    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.to_local(instant).date_naive()
    }

    /// UTC bounds `[start, end)` of a local calendar day.
    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
        let start = (midnight - self.offset).and_utc();
        (start, start + Duration::days(1))
    }
}

impl Default for PresentationZone {
    fn default() -> Self {
        Self::utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_advances() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        clock.advance(Duration::hours(2));
        assert_eq!(clock.now(), start + Duration::hours(2));
    }

    #[test]
    fn day_bounds_follow_offset() {
        let zone = PresentationZone::from_minutes(330);
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let (start, end) = zone.day_bounds(date);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 2, 28, 18, 30, 0).unwrap());
        assert_eq!(end - start, Duration::days(1));
    }

    #[test]
    fn local_date_crosses_midnight() {
        let zone = PresentationZone::from_minutes(330);
        let instant = Utc.with_ymd_and_hms(2026, 3, 1, 19, 0, 0).unwrap();
        assert_eq!(
            zone.local_date(instant),
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
        );
        assert_eq!(zone.to_local(instant).to_rfc3339(), "2026-03-02T00:30:00+05:30");
    }

    #[test]
    fn out_of_range_offset_is_utc() {
        let zone = PresentationZone::from_minutes(60 * 30);
        assert_eq!(zone.offset().local_minus_utc(), 0);
    }
}
