//! SeaORM implementation of UserRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use tracing::debug;
use uuid::Uuid;

use crate::domain::user::{User, UserRepository, UserRole};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::user;

pub struct SeaOrmUserRepository {
    db: DatabaseConnection,
}

impl SeaOrmUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: user::Model) -> DomainResult<User> {
    let role = m
        .role
        .parse::<UserRole>()
        .map_err(|e| DomainError::Integrity(format!("user {}: {}", m.id, e)))?;
    Ok(User {
        id: m.id,
        email: m.email,
        full_name: m.full_name,
        password_hash: m.password_hash,
        role,
        is_active: m.is_active,
        assigned_station_id: m.assigned_station_id,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

fn models_to_domain(models: Vec<user::Model>) -> DomainResult<Vec<User>> {
    models.into_iter().map(model_to_domain).collect()
}

fn domain_to_active(u: User) -> user::ActiveModel {
    user::ActiveModel {
        id: Set(u.id),
        email: Set(u.email.to_lowercase()),
        full_name: Set(u.full_name),
        password_hash: Set(u.password_hash),
        role: Set(u.role.as_str().to_string()),
        is_active: Set(u.is_active),
        assigned_station_id: Set(u.assigned_station_id),
        created_at: Set(u.created_at),
        updated_at: Set(u.updated_at),
    }
}

fn db_err(e: DbErr) -> DomainError {
    DomainError::Storage(format!("Database error: {}", e))
}

fn unique_err(email: &str, e: DbErr) -> DomainError {
    let text = e.to_string();
    if text.contains("UNIQUE") || text.contains("duplicate") {
        DomainError::Conflict(format!("User with email {} already exists", email))
    } else {
        db_err(e)
    }
}

// ── UserRepository impl ─────────────────────────────────────────

#[async_trait]
impl UserRepository for SeaOrmUserRepository {
    async fn insert(&self, u: User) -> DomainResult<()> {
        debug!("Saving user: {}", u.id);
        let email = u.email.clone();
        domain_to_active(u)
            .insert(&self.db)
            .await
            .map_err(|e| unique_err(&email, e))?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<User>> {
        user::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>> {
        user::Entity::find()
            .filter(user::Column::Email.eq(email.to_lowercase()))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_many(&self, ids: &[Uuid]) -> DomainResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = user::Entity::find()
            .filter(user::Column::Id.is_in(ids.iter().copied()))
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn find_by_role(&self, role: UserRole) -> DomainResult<Vec<User>> {
        let models = user::Entity::find()
            .filter(user::Column::Role.eq(role.as_str()))
            .order_by_desc(user::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn count(&self) -> DomainResult<u64> {
        user::Entity::find().count(&self.db).await.map_err(db_err)
    }

    async fn update(&self, u: User) -> DomainResult<bool> {
        debug!("Updating user: {}", u.id);
        let email = u.email.clone();
        match domain_to_active(u).update(&self.db).await {
            Ok(_) => Ok(true),
            Err(DbErr::RecordNotUpdated) => Ok(false),
            Err(e) => Err(unique_err(&email, e)),
        }
    }

    async fn delete(&self, id: Uuid) -> DomainResult<bool> {
        let result = user::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database::{connect_and_migrate, DatabaseConfig};
    use chrono::Utc;

    async fn repo() -> SeaOrmUserRepository {
        let db = connect_and_migrate(&DatabaseConfig::in_memory())
            .await
            .unwrap();
        SeaOrmUserRepository::new(db)
    }

    #[tokio::test]
    async fn email_lookup_ignores_case() {
        let repo = repo().await;
        let u = User::new("Nimal@Example.com", "Nimal", "hash", UserRole::Backoffice, Utc::now());
        repo.insert(u.clone()).await.unwrap();

        let found = repo.find_by_email("NIMAL@example.COM").await.unwrap().unwrap();
        assert_eq!(found.id, u.id);
        assert_eq!(found.role, UserRole::Backoffice);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let repo = repo().await;
        repo.insert(User::new("a@ev.lk", "A", "h", UserRole::EVOwner, Utc::now()))
            .await
            .unwrap();
        let err = repo
            .insert(User::new("a@ev.lk", "B", "h", UserRole::EVOwner, Utc::now()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "conflict");
    }

    #[tokio::test]
    async fn role_listing_and_delete() {
        let repo = repo().await;
        let op = User::new("op@ev.lk", "Op", "h", UserRole::StationOperator, Utc::now());
        repo.insert(op.clone()).await.unwrap();
        repo.insert(User::new("o@ev.lk", "O", "h", UserRole::EVOwner, Utc::now()))
            .await
            .unwrap();

        let operators = repo.find_by_role(UserRole::StationOperator).await.unwrap();
        assert_eq!(operators.len(), 1);
        assert!(repo.delete(op.id).await.unwrap());
        assert!(!repo.delete(op.id).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 1);
    }
}
