//! SeaORM implementation of StationRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use tracing::debug;
use uuid::Uuid;

use crate::domain::station::{GeoPoint, Station, StationRepository, StationStatus};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::station;

pub struct SeaOrmStationRepository {
    db: DatabaseConnection,
}

impl SeaOrmStationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn integrity(id: Uuid, what: &str, e: impl std::fmt::Display) -> DomainError {
    DomainError::Integrity(format!("station {}: bad {}: {}", id, what, e))
}

fn count_to_domain(id: Uuid, what: &str, value: i32) -> DomainResult<u32> {
    u32::try_from(value).map_err(|e| integrity(id, what, e))
}

fn model_to_domain(m: station::Model) -> DomainResult<Station> {
    let id = m.id;
    Ok(Station {
        id,
        name: m.name,
        code: m.code,
        ac_slot_count: count_to_domain(id, "ac_slot_count", m.ac_slot_count)?,
        dc_slot_count: count_to_domain(id, "dc_slot_count", m.dc_slot_count)?,
        ac_slots: serde_json::from_str(&m.ac_slots).map_err(|e| integrity(id, "ac_slots", e))?,
        dc_slots: serde_json::from_str(&m.dc_slots).map_err(|e| integrity(id, "dc_slots", e))?,
        address_line1: m.address_line1,
        address_line2: m.address_line2,
        city: m.city,
        location: GeoPoint {
            latitude: m.latitude,
            longitude: m.longitude,
        },
        notes: m.notes,
        status: m
            .status
            .parse::<StationStatus>()
            .map_err(|e| integrity(id, "status", e))?,
        operator_ids: serde_json::from_str(&m.operator_ids)
            .map_err(|e| integrity(id, "operator_ids", e))?,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

fn models_to_domain(models: Vec<station::Model>) -> DomainResult<Vec<Station>> {
    models.into_iter().map(model_to_domain).collect()
}

fn to_json<T: serde::Serialize>(value: &T) -> DomainResult<String> {
    serde_json::to_string(value)
        .map_err(|e| DomainError::Integrity(format!("Failed to encode station field: {}", e)))
}

fn count_to_db(value: u32) -> DomainResult<i32> {
    i32::try_from(value)
        .map_err(|_| DomainError::Validation(format!("Slot count {} is too large", value)))
}

fn domain_to_active(s: Station) -> DomainResult<station::ActiveModel> {
    Ok(station::ActiveModel {
        id: Set(s.id),
        ac_slot_count: Set(count_to_db(s.ac_slot_count)?),
        dc_slot_count: Set(count_to_db(s.dc_slot_count)?),
        ac_slots: Set(to_json(&s.ac_slots)?),
        dc_slots: Set(to_json(&s.dc_slots)?),
        operator_ids: Set(to_json(&s.operator_ids)?),
        name: Set(s.name),
        code: Set(s.code),
        address_line1: Set(s.address_line1),
        address_line2: Set(s.address_line2),
        city: Set(s.city),
        latitude: Set(s.location.latitude),
        longitude: Set(s.location.longitude),
        notes: Set(s.notes),
        status: Set(s.status.as_str().to_string()),
        created_at: Set(s.created_at),
        updated_at: Set(s.updated_at),
    })
}

fn db_err(e: DbErr) -> DomainError {
    DomainError::Storage(format!("Database error: {}", e))
}

fn insert_err(code: &str, e: DbErr) -> DomainError {
    let text = e.to_string();
    if text.contains("UNIQUE") || text.contains("duplicate") {
        DomainError::Conflict(format!("Station code {} already exists", code))
    } else {
        db_err(e)
    }
}

// ── StationRepository impl ──────────────────────────────────────

#[async_trait]
impl StationRepository for SeaOrmStationRepository {
    async fn insert(&self, s: Station) -> DomainResult<()> {
        debug!("Saving station: {} ({})", s.code, s.id);
        let code = s.code.clone();
        domain_to_active(s)?
            .insert(&self.db)
            .await
            .map_err(|e| insert_err(&code, e))?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Station>> {
        station::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_many(&self, ids: &[Uuid]) -> DomainResult<Vec<Station>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = station::Entity::find()
            .filter(station::Column::Id.is_in(ids.iter().copied()))
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn find_all(&self) -> DomainResult<Vec<Station>> {
        let models = station::Entity::find()
            .order_by_asc(station::Column::Name)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn find_by_status(&self, status: StationStatus) -> DomainResult<Vec<Station>> {
        let models = station::Entity::find()
            .filter(station::Column::Status.eq(status.as_str()))
            .order_by_asc(station::Column::Name)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn update(&self, s: Station) -> DomainResult<bool> {
        debug!("Updating station: {}", s.id);
        match domain_to_active(s)?.update(&self.db).await {
            Ok(_) => Ok(true),
            Err(DbErr::RecordNotUpdated) => Ok(false),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn count_by_status(&self, status: StationStatus) -> DomainResult<u64> {
        station::Entity::find()
            .filter(station::Column::Status.eq(status.as_str()))
            .count(&self.db)
            .await
            .map_err(db_err)
    }

    async fn count_all(&self) -> DomainResult<u64> {
        station::Entity::find().count(&self.db).await.map_err(db_err)
    }

    async fn find_by_operator(&self, user_id: Uuid) -> DomainResult<Option<Station>> {
        // Substring match narrows the scan; the decoded list is authoritative.
        let models = station::Entity::find()
            .filter(station::Column::OperatorIds.contains(user_id.to_string()))
            .all(&self.db)
            .await
            .map_err(db_err)?;
        for station in models_to_domain(models)? {
            if station.has_operator(user_id) {
                return Ok(Some(station));
            }
        }
        Ok(None)
    }

    async fn assigned_operator_ids(&self) -> DomainResult<Vec<Uuid>> {
        let mut ids: Vec<Uuid> = self
            .find_all()
            .await?
            .into_iter()
            .flat_map(|s| s.operator_ids)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}
