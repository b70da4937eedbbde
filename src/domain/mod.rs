pub mod booking;
pub mod owner;
pub mod repositories;
pub mod station;
pub mod user;

// Re-export commonly used types
pub use booking::{Booking, BookingRepository, BookingStatus, ChargingMode, TimeWindow};
pub use owner::{AccountStatus, OwnerProfile, OwnerProfileRepository};
pub use repositories::RepositoryProvider;
pub use station::{GeoPoint, Station, StationRepository, StationStatus};
pub use user::{Caller, User, UserRepository, UserRole};

// Re-export DomainError from shared for convenience
pub use crate::shared::{DomainError, DomainResult};
