pub(crate) mod access;
pub mod booking;
pub mod dashboard;
pub mod locks;
pub mod owner;
pub mod ports;
pub mod services;
pub mod station;
pub mod user;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types for convenience
pub use booking::{
    AvailabilityService, BookingDetails, BookingOutcome, BookingPolicy, BookingService,
    CreateBookingRequest, DayAvailability, OperatorBookingView, SlotAvailability,
    UpdateBookingRequest,
};
pub use dashboard::{DashboardMetrics, DashboardService, StationLocation};
pub use locks::{SlotKey, SlotLockRegistry};
pub use owner::{OwnerService, RegisterOwnerRequest};
pub use ports::{NotificationSender, QrEncoder};
pub use services::AppServices;
pub use station::{OperatorAssignment, StationService};
pub use user::{AuthResult, UserService};
