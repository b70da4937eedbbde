//! Station aggregate
//!
//! Contains the Station entity, slot inventory generation, and repository
//! interface.

pub mod inventory;
pub mod model;
pub mod repository;

pub use model::{GeoPoint, Station, StationStatus};
pub use repository::StationRepository;
