use async_trait::async_trait;
use uuid::Uuid;

use super::model::{User, UserRole};
use crate::shared::DomainResult;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert(&self, user: User) -> DomainResult<()>;

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<User>>;

    /// Case-insensitive
    async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>>;

    async fn find_many(&self, ids: &[Uuid]) -> DomainResult<Vec<User>>;

    async fn find_by_role(&self, role: UserRole) -> DomainResult<Vec<User>>;

    async fn count(&self) -> DomainResult<u64>;

    /// Returns false when the user does not exist.
    async fn update(&self, user: User) -> DomainResult<bool>;

    async fn delete(&self, id: Uuid) -> DomainResult<bool>;
}
