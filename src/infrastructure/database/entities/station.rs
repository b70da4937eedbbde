//! Charging station entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub name: String,
    #[sea_orm(unique)]
    pub code: String,

    pub ac_slot_count: i32,
    pub dc_slot_count: i32,

    /// JSON array of slot ids, e.g. `["A1","A2"]`
    #[sea_orm(column_type = "Text")]
    pub ac_slots: String,
    #[sea_orm(column_type = "Text")]
    pub dc_slots: String,

    pub address_line1: String,
    #[sea_orm(nullable)]
    pub address_line2: Option<String>,
    pub city: String,

    pub latitude: f64,
    pub longitude: f64,

    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,

    /// Station status: Active, Deactivated, UnderMaintenance
    pub status: String,

    /// JSON array of assigned operator user ids
    #[sea_orm(column_type = "Text")]
    pub operator_ids: String,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::booking::Entity")]
    Bookings,
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
