//! User aggregate
//!
//! Contains the User entity, the caller identity, and repository interface.

pub mod model;
pub mod repository;

pub use model::{Caller, User, UserRole};
pub use repository::UserRepository;
