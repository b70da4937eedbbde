//! SeaORM implementation of BookingRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::debug;
use uuid::Uuid;

use crate::domain::booking::{
    Booking, BookingRepository, BookingStatus, ChargingMode, ConflictQuery, TimeWindow,
};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::booking;

pub struct SeaOrmBookingRepository {
    db: DatabaseConnection,
}

impl SeaOrmBookingRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: booking::Model) -> DomainResult<Booking> {
    let mode = m
        .mode
        .parse::<ChargingMode>()
        .map_err(|e| DomainError::Integrity(format!("booking {}: {}", m.id, e)))?;
    let status = m
        .status
        .parse::<BookingStatus>()
        .map_err(|e| DomainError::Integrity(format!("booking {}: {}", m.id, e)))?;
    let window = TimeWindow::new(m.start_time, m.end_time)
        .map_err(|e| DomainError::Integrity(format!("booking {}: {}", m.id, e)))?;

    Ok(Booking {
        id: m.id,
        owner_id: m.owner_id,
        station_id: m.station_id,
        mode,
        slot_id: m.slot_id,
        window,
        status,
        qr_code: m.qr_code,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

fn models_to_domain(models: Vec<booking::Model>) -> DomainResult<Vec<Booking>> {
    models.into_iter().map(model_to_domain).collect()
}

fn domain_to_active(b: Booking) -> booking::ActiveModel {
    booking::ActiveModel {
        id: Set(b.id),
        owner_id: Set(b.owner_id),
        station_id: Set(b.station_id),
        mode: Set(b.mode.as_str().to_string()),
        slot_id: Set(b.slot_id),
        start_time: Set(b.window.start),
        end_time: Set(b.window.end),
        status: Set(b.status.as_str().to_string()),
        qr_code: Set(b.qr_code),
        created_at: Set(b.created_at),
        updated_at: Set(b.updated_at),
    }
}

fn status_values(statuses: &[BookingStatus]) -> Vec<&'static str> {
    statuses.iter().map(|s| s.as_str()).collect()
}

fn db_err(e: DbErr) -> DomainError {
    DomainError::Storage(format!("Database error: {}", e))
}

// ── BookingRepository impl ──────────────────────────────────────

#[async_trait]
impl BookingRepository for SeaOrmBookingRepository {
    async fn insert(&self, b: Booking) -> DomainResult<()> {
        debug!("Saving booking: {}", b.id);
        domain_to_active(b).insert(&self.db).await.map_err(db_err)?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Booking>> {
        booking::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn replace_if_unchanged(&self, b: Booking, seen: &Booking) -> DomainResult<bool> {
        debug!("Replacing booking: {}", b.id);
        let result = booking::Entity::update(domain_to_active(b))
            .filter(booking::Column::Status.eq(seen.status.as_str()))
            .filter(booking::Column::StationId.eq(seen.station_id))
            .filter(booking::Column::Mode.eq(seen.mode.as_str()))
            .filter(booking::Column::SlotId.eq(seen.slot_id.as_str()))
            .filter(booking::Column::StartTime.eq(seen.window.start))
            .filter(booking::Column::EndTime.eq(seen.window.end))
            .filter(booking::Column::UpdatedAt.eq(seen.updated_at))
            .exec(&self.db)
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(DbErr::RecordNotUpdated) => Ok(false),
            Err(e) => Err(db_err(e)),
        }
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: &[BookingStatus],
        to: BookingStatus,
        qr_code: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let result = booking::Entity::update_many()
            .col_expr(booking::Column::Status, Expr::value(to.as_str()))
            .col_expr(booking::Column::QrCode, Expr::value(qr_code))
            .col_expr(booking::Column::UpdatedAt, Expr::value(at))
            .filter(booking::Column::Id.eq(id))
            .filter(booking::Column::Status.is_in(status_values(from)))
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected == 1)
    }

    async fn delete(&self, id: Uuid) -> DomainResult<bool> {
        let result = booking::Entity::delete_by_id(id)
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected > 0)
    }

    async fn count_conflicts(&self, query: &ConflictQuery) -> DomainResult<u64> {
        let mut select = booking::Entity::find()
            .filter(booking::Column::StationId.eq(query.station_id))
            .filter(booking::Column::Mode.eq(query.mode.as_str()))
            .filter(booking::Column::SlotId.eq(query.slot_id.as_str()))
            .filter(booking::Column::Status.is_in(status_values(&BookingStatus::ACTIVE)))
            .filter(booking::Column::StartTime.lt(query.window.end))
            .filter(booking::Column::EndTime.gt(query.window.start));
        if let Some(excluded) = query.exclude {
            select = select.filter(booking::Column::Id.ne(excluded));
        }

        select.count(&self.db).await.map_err(db_err)
    }

    async fn booked_slot_ids(
        &self,
        station_id: Uuid,
        mode: ChargingMode,
        window: &TimeWindow,
    ) -> DomainResult<Vec<String>> {
        let mut slots: Vec<String> = booking::Entity::find()
            .select_only()
            .column(booking::Column::SlotId)
            .distinct()
            .filter(booking::Column::StationId.eq(station_id))
            .filter(booking::Column::Mode.eq(mode.as_str()))
            .filter(booking::Column::Status.is_in(status_values(&BookingStatus::ACTIVE)))
            .filter(booking::Column::StartTime.lt(window.end))
            .filter(booking::Column::EndTime.gt(window.start))
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(db_err)?;
        slots.sort();
        Ok(slots)
    }

    async fn find_active_starting_between(
        &self,
        station_id: Uuid,
        mode: ChargingMode,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<Booking>> {
        let models = booking::Entity::find()
            .filter(booking::Column::StationId.eq(station_id))
            .filter(booking::Column::Mode.eq(mode.as_str()))
            .filter(booking::Column::Status.is_in(status_values(&BookingStatus::ACTIVE)))
            .filter(booking::Column::StartTime.gte(from))
            .filter(booking::Column::StartTime.lt(to))
            .order_by_asc(booking::Column::StartTime)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn find_active_for_station(&self, station_id: Uuid) -> DomainResult<Vec<Booking>> {
        let models = booking::Entity::find()
            .filter(booking::Column::StationId.eq(station_id))
            .filter(booking::Column::Status.is_in(status_values(&BookingStatus::ACTIVE)))
            .order_by_asc(booking::Column::StartTime)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn find_by_owner(&self, owner_id: Uuid) -> DomainResult<Vec<Booking>> {
        let models = booking::Entity::find()
            .filter(booking::Column::OwnerId.eq(owner_id))
            .order_by_desc(booking::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn find_by_station(&self, station_id: Uuid) -> DomainResult<Vec<Booking>> {
        let models = booking::Entity::find()
            .filter(booking::Column::StationId.eq(station_id))
            .order_by_desc(booking::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn find_all(&self) -> DomainResult<Vec<Booking>> {
        let models = booking::Entity::find()
            .order_by_desc(booking::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn find_upcoming_for_stations(
        &self,
        station_ids: &[Uuid],
        after: DateTime<Utc>,
    ) -> DomainResult<Vec<Booking>> {
        if station_ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = booking::Entity::find()
            .filter(booking::Column::StationId.is_in(station_ids.iter().copied()))
            .filter(booking::Column::Status.is_in(status_values(&BookingStatus::ACTIVE)))
            .filter(booking::Column::StartTime.gt(after))
            .order_by_asc(booking::Column::StartTime)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn count_by_status(
        &self,
        status: BookingStatus,
        starting_after: Option<DateTime<Utc>>,
    ) -> DomainResult<u64> {
        let mut select =
            booking::Entity::find().filter(booking::Column::Status.eq(status.as_str()));
        if let Some(after) = starting_after {
            select = select.filter(booking::Column::StartTime.gt(after));
        }
        select.count(&self.db).await.map_err(db_err)
    }

    async fn count_active_starting_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<u64> {
        booking::Entity::find()
            .filter(booking::Column::Status.is_in(status_values(&BookingStatus::ACTIVE)))
            .filter(booking::Column::StartTime.gte(from))
            .filter(booking::Column::StartTime.lt(to))
            .count(&self.db)
            .await
            .map_err(db_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Station, StationRepository};
    use crate::infrastructure::database::repositories::SeaOrmStationRepository;
    use crate::infrastructure::database::{connect_and_migrate, DatabaseConfig};
    use chrono::{Duration, TimeZone};

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, h, m, 0).unwrap()
    }

    async fn setup() -> (SeaOrmBookingRepository, Uuid) {
        let db = connect_and_migrate(&DatabaseConfig::in_memory())
            .await
            .unwrap();
        let station = Station::new("Colombo Fort", "CMB-01", 2, 1, t(0, 0));
        let station_id = station.id;
        SeaOrmStationRepository::new(db.clone())
            .insert(station)
            .await
            .unwrap();
        (SeaOrmBookingRepository::new(db), station_id)
    }

    fn booking(station_id: Uuid, slot: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> Booking {
        Booking::new(
            Uuid::new_v4(),
            station_id,
            ChargingMode::Ac,
            slot,
            TimeWindow::new(from, to).unwrap(),
            BookingStatus::Pending,
            t(0, 0),
        )
    }

    #[tokio::test]
    async fn insert_and_find_round_trip() {
        let (repo, station_id) = setup().await;
        let b = booking(station_id, "A1", t(10, 0), t(11, 0));
        repo.insert(b.clone()).await.unwrap();

        let found = repo.find_by_id(b.id).await.unwrap().unwrap();
        assert_eq!(found.slot_id, "A1");
        assert_eq!(found.window, b.window);
        assert_eq!(found.status, BookingStatus::Pending);
        assert!(repo.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn conflict_query_matches_half_open_overlap() {
        let (repo, station_id) = setup().await;
        let existing = booking(station_id, "A1", t(10, 0), t(11, 0));
        let existing_id = existing.id;
        repo.insert(existing).await.unwrap();

        let window = |a, b| TimeWindow::new(a, b).unwrap();
        let q = |w| ConflictQuery::new(station_id, ChargingMode::Ac, "A1", w);

        assert_eq!(repo.count_conflicts(&q(window(t(10, 30), t(11, 30)))).await.unwrap(), 1);
        assert_eq!(repo.count_conflicts(&q(window(t(11, 0), t(12, 0)))).await.unwrap(), 0);
        assert_eq!(repo.count_conflicts(&q(window(t(9, 0), t(10, 0)))).await.unwrap(), 0);
        assert_eq!(
            repo.count_conflicts(&q(window(t(9, 0), t(12, 0))).excluding(existing_id))
                .await
                .unwrap(),
            0
        );

        let other_slot = ConflictQuery::new(
            station_id,
            ChargingMode::Ac,
            "A2",
            window(t(10, 0), t(11, 0)),
        );
        assert_eq!(repo.count_conflicts(&other_slot).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn canceled_booking_frees_the_slot() {
        let (repo, station_id) = setup().await;
        let b = booking(station_id, "A1", t(10, 0), t(11, 0));
        let id = b.id;
        repo.insert(b).await.unwrap();

        let moved = repo
            .transition_status(
                id,
                &BookingStatus::ACTIVE,
                BookingStatus::Canceled,
                None,
                t(1, 0),
            )
            .await
            .unwrap();
        assert!(moved);

        let query = ConflictQuery::new(
            station_id,
            ChargingMode::Ac,
            "A1",
            TimeWindow::new(t(10, 0), t(11, 0)).unwrap(),
        );
        assert_eq!(repo.count_conflicts(&query).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn transition_requires_expected_status() {
        let (repo, station_id) = setup().await;
        let b = booking(station_id, "A1", t(10, 0), t(11, 0));
        let id = b.id;
        repo.insert(b).await.unwrap();

        assert!(repo
            .transition_status(
                id,
                &[BookingStatus::Pending],
                BookingStatus::Approved,
                Some("qr-data".into()),
                t(1, 0),
            )
            .await
            .unwrap());
        assert!(!repo
            .transition_status(
                id,
                &[BookingStatus::Pending],
                BookingStatus::Approved,
                None,
                t(2, 0),
            )
            .await
            .unwrap());

        let stored = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Approved);
        assert_eq!(stored.qr_code.as_deref(), Some("qr-data"));
    }

    #[tokio::test]
    async fn replace_is_guarded_by_the_read_revision() {
        let (repo, station_id) = setup().await;
        let b = booking(station_id, "A1", t(10, 0), t(11, 0));
        repo.insert(b.clone()).await.unwrap();
        let seen = repo.find_by_id(b.id).await.unwrap().unwrap();

        let mut moved = seen.clone();
        moved.slot_id = "A2".into();
        assert!(repo.replace_if_unchanged(moved, &seen).await.unwrap());

        // Same status, but placed on A1: the stored row is now on A2.
        let mut stale = seen.clone();
        stale.status = BookingStatus::Approved;
        assert!(!repo.replace_if_unchanged(stale, &seen).await.unwrap());

        let stored = repo.find_by_id(b.id).await.unwrap().unwrap();
        assert_eq!(stored.slot_id, "A2");
        assert_eq!(stored.status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn booked_slots_and_day_queries() {
        let (repo, station_id) = setup().await;
        repo.insert(booking(station_id, "A2", t(10, 0), t(11, 0)))
            .await
            .unwrap();
        repo.insert(booking(station_id, "A2", t(11, 0), t(12, 0)))
            .await
            .unwrap();
        repo.insert(booking(station_id, "A1", t(14, 0), t(15, 0)))
            .await
            .unwrap();

        let window = TimeWindow::new(t(10, 30), t(11, 30)).unwrap();
        let booked = repo
            .booked_slot_ids(station_id, ChargingMode::Ac, &window)
            .await
            .unwrap();
        assert_eq!(booked, vec!["A2".to_string()]);

        let morning = repo
            .find_active_starting_between(station_id, ChargingMode::Ac, t(0, 0), t(12, 0))
            .await
            .unwrap();
        assert_eq!(morning.len(), 2);

        let whole_day = repo
            .count_active_starting_between(t(0, 0), t(0, 0) + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(whole_day, 3);
    }
}
