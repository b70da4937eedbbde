//! Booking module: lifecycle and availability
//!
//! `BookingService` owns every booking mutation; `AvailabilityService`
//! answers the read-only slot and calendar queries.

pub mod availability;
pub mod policy;
pub mod service;
pub mod views;

pub use availability::AvailabilityService;
pub use policy::BookingPolicy;
pub use service::{BookingService, CreateBookingRequest, UpdateBookingRequest};
pub use views::{
    BookingDetails, BookingOutcome, DayAvailability, OperatorBookingView, SlotAvailability,
    TimeBucket,
};
