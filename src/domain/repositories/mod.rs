//! Repository provider for the domain layer
//!
//! Consumers request only the repository they need:
//!
//! ```ignore
//! async fn handle(repos: &dyn RepositoryProvider) {
//!     let station = repos.stations().find_by_id(station_id).await?;
//!     let taken = repos.bookings().count_conflicts(&query).await?;
//! }
//! ```

use super::booking::BookingRepository;
use super::owner::OwnerProfileRepository;
use super::station::StationRepository;
use super::user::UserRepository;

pub trait RepositoryProvider: Send + Sync {
    fn bookings(&self) -> &dyn BookingRepository;
    fn stations(&self) -> &dyn StationRepository;
    fn owners(&self) -> &dyn OwnerProfileRepository;
    fn users(&self) -> &dyn UserRepository;
}
