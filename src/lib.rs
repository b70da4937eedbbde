//! # EV Booking Service
//!
//! Reservation backend for EV charging stations: owners book charging
//! slots, operators validate and finalize sessions, Backoffice staff manage
//! stations, operators and approvals.
//!
//! ## Architecture
//!
//! The project follows Clean Architecture principles:
//!
//! - **domain**: Entities, the booking state machine, the overlap oracle and
//!   repository traits
//! - **application**: Services orchestrating the use cases, slot locks and
//!   outbound ports
//! - **infrastructure**: SeaORM persistence, in-memory storage, QR encoding,
//!   password hashing, notifications
//! - **shared**: Errors, clock and time zone, cancellation, shutdown

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use config::{default_config_path, AppConfig};

// Re-export database types for easy access
pub use infrastructure::{
    connect_and_migrate, init_database, DatabaseConfig, InMemoryRepositoryProvider,
    SeaOrmRepositoryProvider,
};
