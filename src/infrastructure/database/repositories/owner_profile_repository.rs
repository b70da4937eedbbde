//! SeaORM implementation of OwnerProfileRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::debug;
use uuid::Uuid;

use crate::domain::owner::{AccountStatus, OwnerProfile, OwnerProfileRepository};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::owner_profile;

pub struct SeaOrmOwnerProfileRepository {
    db: DatabaseConnection,
}

impl SeaOrmOwnerProfileRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: owner_profile::Model) -> DomainResult<OwnerProfile> {
    let status = m
        .status
        .parse::<AccountStatus>()
        .map_err(|e| DomainError::Integrity(format!("owner profile {}: {}", m.id, e)))?;
    Ok(OwnerProfile {
        id: m.id,
        user_id: m.user_id,
        nic: m.nic,
        full_name: m.full_name,
        phone: m.phone,
        address: m.address,
        vehicle_model: m.vehicle_model,
        license_plate: m.license_plate,
        status,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

fn models_to_domain(models: Vec<owner_profile::Model>) -> DomainResult<Vec<OwnerProfile>> {
    models.into_iter().map(model_to_domain).collect()
}

fn domain_to_active(p: OwnerProfile) -> owner_profile::ActiveModel {
    owner_profile::ActiveModel {
        id: Set(p.id),
        user_id: Set(p.user_id),
        nic: Set(p.nic),
        full_name: Set(p.full_name),
        phone: Set(p.phone),
        address: Set(p.address),
        vehicle_model: Set(p.vehicle_model),
        license_plate: Set(p.license_plate),
        status: Set(p.status.as_str().to_string()),
        created_at: Set(p.created_at),
        updated_at: Set(p.updated_at),
    }
}

fn db_err(e: DbErr) -> DomainError {
    DomainError::Storage(format!("Database error: {}", e))
}

// ── OwnerProfileRepository impl ─────────────────────────────────

#[async_trait]
impl OwnerProfileRepository for SeaOrmOwnerProfileRepository {
    async fn insert(&self, p: OwnerProfile) -> DomainResult<()> {
        debug!("Saving owner profile: {}", p.nic);
        let nic = p.nic.clone();
        domain_to_active(p).insert(&self.db).await.map_err(|e| {
            let text = e.to_string();
            if text.contains("UNIQUE") || text.contains("duplicate") {
                DomainError::Conflict(format!("Profile with NIC {} already exists", nic))
            } else {
                db_err(e)
            }
        })?;
        Ok(())
    }

    async fn find_by_nic(&self, nic: &str) -> DomainResult<Option<OwnerProfile>> {
        owner_profile::Entity::find()
            .filter(owner_profile::Column::Nic.eq(nic))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_by_user_id(&self, user_id: Uuid) -> DomainResult<Option<OwnerProfile>> {
        owner_profile::Entity::find()
            .filter(owner_profile::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_many_by_user_ids(&self, user_ids: &[Uuid]) -> DomainResult<Vec<OwnerProfile>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = owner_profile::Entity::find()
            .filter(owner_profile::Column::UserId.is_in(user_ids.iter().copied()))
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn find_all(&self) -> DomainResult<Vec<OwnerProfile>> {
        let models = owner_profile::Entity::find()
            .order_by_desc(owner_profile::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn update(&self, p: OwnerProfile) -> DomainResult<bool> {
        debug!("Updating owner profile: {}", p.nic);
        match domain_to_active(p).update(&self.db).await {
            Ok(_) => Ok(true),
            Err(DbErr::RecordNotUpdated) => Ok(false),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn delete_by_nic(&self, nic: &str) -> DomainResult<bool> {
        let result = owner_profile::Entity::delete_many()
            .filter(owner_profile::Column::Nic.eq(nic))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{User, UserRepository, UserRole};
    use crate::infrastructure::database::repositories::SeaOrmUserRepository;
    use crate::infrastructure::database::{connect_and_migrate, DatabaseConfig};
    use chrono::Utc;

    #[tokio::test]
    async fn profile_is_found_by_nic_and_user() {
        let db = connect_and_migrate(&DatabaseConfig::in_memory())
            .await
            .unwrap();
        let users = SeaOrmUserRepository::new(db.clone());
        let profiles = SeaOrmOwnerProfileRepository::new(db);

        let user = User::new("kamal@ev.lk", "Kamal", "h", UserRole::EVOwner, Utc::now());
        users.insert(user.clone()).await.unwrap();
        let mut profile =
            OwnerProfile::new(user.id, "199012345678", "Kamal", "0771234567", Utc::now());
        profile.license_plate = Some("WP CAB-1234".into());
        profiles.insert(profile.clone()).await.unwrap();

        let by_nic = profiles.find_by_nic("199012345678").await.unwrap().unwrap();
        assert_eq!(by_nic.user_id, user.id);
        assert_eq!(by_nic.license_plate.as_deref(), Some("WP CAB-1234"));
        assert!(profiles.find_by_user_id(user.id).await.unwrap().is_some());

        let dup = OwnerProfile::new(user.id, "199012345678", "Other", "0", Utc::now());
        assert_eq!(profiles.insert(dup).await.unwrap_err().kind(), "conflict");

        assert!(profiles.delete_by_nic("199012345678").await.unwrap());
        assert!(profiles.find_by_nic("199012345678").await.unwrap().is_none());
    }
}
