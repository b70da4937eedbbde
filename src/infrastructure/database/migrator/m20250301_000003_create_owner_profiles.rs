//! Create owner_profiles table
//!
//! One profile per EV owner account, addressed by NIC.

use sea_orm_migration::prelude::*;

use super::m20250301_000002_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OwnerProfiles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OwnerProfiles::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OwnerProfiles::UserId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(OwnerProfiles::Nic)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(OwnerProfiles::FullName).string().not_null())
                    .col(ColumnDef::new(OwnerProfiles::Phone).string().not_null())
                    .col(ColumnDef::new(OwnerProfiles::Address).string())
                    .col(ColumnDef::new(OwnerProfiles::VehicleModel).string())
                    .col(ColumnDef::new(OwnerProfiles::LicensePlate).string())
                    .col(
                        ColumnDef::new(OwnerProfiles::Status)
                            .string()
                            .not_null()
                            .default("Active"),
                    )
                    .col(
                        ColumnDef::new(OwnerProfiles::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OwnerProfiles::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_owner_profiles_user")
                            .from(OwnerProfiles::Table, OwnerProfiles::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OwnerProfiles::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum OwnerProfiles {
    Table,
    Id,
    UserId,
    Nic,
    FullName,
    Phone,
    Address,
    VehicleModel,
    LicensePlate,
    Status,
    CreatedAt,
    UpdatedAt,
}
