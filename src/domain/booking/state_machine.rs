//! Booking lifecycle transitions
//!
//! ```text
//!  create(owner) ─► Pending ──approve──► Approved ──finalize──► Completed
//!  create(staff) ──────────────────────► Approved
//!                  Pending/Approved ──cancel──► Canceled
//!                  Completed/Canceled ──delete──► (removed)
//! ```

use super::model::BookingStatus;
use crate::shared::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingAction {
    Approve,
    Finalize,
    Cancel,
    Edit,
    Delete,
}

impl BookingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Finalize => "finalize",
            Self::Cancel => "cancel",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }

    /// Statuses from which the action is legal.
    pub fn allowed_from(&self) -> &'static [BookingStatus] {
        match self {
            Self::Approve => &[BookingStatus::Pending],
            Self::Finalize => &[BookingStatus::Approved],
            Self::Cancel | Self::Edit => &BookingStatus::ACTIVE,
            Self::Delete => &[BookingStatus::Completed, BookingStatus::Canceled],
        }
    }

    /// Fixed target status; `None` for Edit (role/request decided) and Delete.
    pub fn target(&self) -> Option<BookingStatus> {
        match self {
            Self::Approve => Some(BookingStatus::Approved),
            Self::Finalize => Some(BookingStatus::Completed),
            Self::Cancel => Some(BookingStatus::Canceled),
            Self::Edit | Self::Delete => None,
        }
    }
}

/// Transition side effect: entering Approved always issues a fresh QR.
pub fn issues_qr(to: BookingStatus) -> bool {
    to == BookingStatus::Approved
}

/// Check that `action` may run on a booking in `current`.
pub fn ensure_allowed(current: BookingStatus, action: BookingAction) -> DomainResult<()> {
    if action.allowed_from().contains(&current) {
        return Ok(());
    }
    let reason = match (action, current) {
        (BookingAction::Approve, BookingStatus::Approved | BookingStatus::Completed) => {
            "Booking is already approved or completed.".to_string()
        }
        (BookingAction::Delete, _) => {
            "Only completed or canceled bookings can be deleted.".to_string()
        }
        (_, s) if s.is_terminal() => format!("Booking is {} and can no longer change.", s),
        (a, s) => format!("Cannot {} a booking that is {}.", a.as_str(), s),
    };
    Err(DomainError::Conflict(reason))
}
