//! EV owner aggregate

pub mod model;
pub mod repository;

pub use model::{AccountStatus, OwnerProfile};
pub use repository::OwnerProfileRepository;
