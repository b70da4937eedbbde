//! Owner profile repository interface

use async_trait::async_trait;
use uuid::Uuid;

use super::model::OwnerProfile;
use crate::shared::DomainResult;

#[async_trait]
pub trait OwnerProfileRepository: Send + Sync {
    async fn insert(&self, profile: OwnerProfile) -> DomainResult<()>;

    async fn find_by_nic(&self, nic: &str) -> DomainResult<Option<OwnerProfile>>;

    async fn find_by_user_id(&self, user_id: Uuid) -> DomainResult<Option<OwnerProfile>>;

    async fn find_many_by_user_ids(&self, user_ids: &[Uuid]) -> DomainResult<Vec<OwnerProfile>>;

    async fn find_all(&self) -> DomainResult<Vec<OwnerProfile>>;

    /// Returns false when the profile does not exist.
    async fn update(&self, profile: OwnerProfile) -> DomainResult<bool>;

    async fn delete_by_nic(&self, nic: &str) -> DomainResult<bool>;
}
