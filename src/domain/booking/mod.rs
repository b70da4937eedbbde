//! Booking aggregate
//!
//! Contains the Booking entity, the overlap oracle, the lifecycle state
//! machine and the repository interface.

pub mod model;
pub mod oracle;
pub mod repository;
pub mod state_machine;

pub use model::{Booking, BookingStatus, ChargingMode, TimeWindow};
pub use oracle::ConflictQuery;
pub use repository::BookingRepository;
pub use state_machine::BookingAction;
