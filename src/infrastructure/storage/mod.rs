//! Storage implementations that live outside a database

mod memory;

pub use memory::{
    InMemoryBookingRepository, InMemoryOwnerProfileRepository, InMemoryRepositoryProvider,
    InMemoryStationRepository, InMemoryUserRepository,
};
