//! Database entities module

pub mod booking;
pub mod owner_profile;
pub mod station;
pub mod user;

pub use booking::Entity as Booking;
pub use owner_profile::Entity as OwnerProfile;
pub use station::Entity as Station;
pub use user::Entity as User;
