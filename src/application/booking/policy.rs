//! Booking time rules

use chrono::{DateTime, Duration, Utc};

use crate::domain::booking::TimeWindow;
use crate::shared::{DomainError, DomainResult};

/// Time limits applied to booking requests and modifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingPolicy {
    /// Furthest start instant accepted, relative to now (inclusive)
    pub max_advance: Duration,
    /// Minimum time before start for owner edits and cancellations (inclusive)
    pub modification_cutoff: Duration,
    /// Width of calendar availability buckets
    pub bucket: Duration,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            max_advance: Duration::days(7),
            modification_cutoff: Duration::hours(12),
            bucket: Duration::minutes(30),
        }
    }
}

impl BookingPolicy {
    pub fn max_advance_days(&self) -> i64 {
        self.max_advance.num_days()
    }

    /// Start must not be in the past nor beyond `now + max_advance`.
    pub fn check_window(&self, window: &TimeWindow, now: DateTime<Utc>) -> DomainResult<()> {
        if window.start < now {
            return Err(DomainError::Validation(
                "Start time cannot be in the past.".into(),
            ));
        }
        self.check_advance(window, now)
    }

    /// Start must not lie beyond `now + max_advance`.
    pub fn check_advance(&self, window: &TimeWindow, now: DateTime<Utc>) -> DomainResult<()> {
        if window.start > now + self.max_advance {
            return Err(DomainError::Validation(format!(
                "Reservation date must be within {} days from today.",
                self.max_advance_days()
            )));
        }
        Ok(())
    }

    /// Cancellations and owner edits need at least `modification_cutoff`
    /// left before the start.
    pub fn check_modifiable(
        &self,
        start: DateTime<Utc>,
        now: DateTime<Utc>,
        action: &str,
    ) -> DomainResult<()> {
        if start - now < self.modification_cutoff {
            return Err(DomainError::Conflict(format!(
                "Bookings can only be {} at least {} hours before the reservation time.",
                action,
                self.modification_cutoff.num_hours()
            )));
        }
        Ok(())
    }
}
