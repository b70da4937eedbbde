//! Station module: inventory, capacity guard and operator assignment

pub mod service;

pub use service::{
    CreateStationRequest, Deactivation, OperatorAssignment, OperatorSummary, StationOutcome,
    StationOverview, StationService, UpcomingBooking, UpdateStationRequest,
};
