//! Station repository interface

use async_trait::async_trait;
use uuid::Uuid;

use super::model::{Station, StationStatus};
use crate::shared::DomainResult;

#[async_trait]
pub trait StationRepository: Send + Sync {
    async fn insert(&self, station: Station) -> DomainResult<()>;

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Station>>;

    async fn find_many(&self, ids: &[Uuid]) -> DomainResult<Vec<Station>>;

    async fn find_all(&self) -> DomainResult<Vec<Station>>;

    async fn find_by_status(&self, status: StationStatus) -> DomainResult<Vec<Station>>;

    /// Replace the stored document. Returns false when it does not exist.
    async fn update(&self, station: Station) -> DomainResult<bool>;

    async fn count_by_status(&self, status: StationStatus) -> DomainResult<u64>;

    async fn count_all(&self) -> DomainResult<u64>;

    /// Station whose operator set contains `user_id`
    async fn find_by_operator(&self, user_id: Uuid) -> DomainResult<Option<Station>>;

    /// Every operator id referenced by any station
    async fn assigned_operator_ids(&self) -> DomainResult<Vec<Uuid>>;
}
