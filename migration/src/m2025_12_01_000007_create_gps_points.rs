//! Migration to create the gps_points table.
//!
//! Raw track points keyed by device serial; the newest row per serial feeds
//! the in-process last-point cache.

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Statement;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GpsPoints::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GpsPoints::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GpsPoints::SysId).integer().not_null().default(1))
                    .col(ColumnDef::new(GpsPoints::OrgId).integer().not_null().default(1))
                    .col(ColumnDef::new(GpsPoints::Sn).string_len(128).not_null())
                    .col(ColumnDef::new(GpsPoints::Longitude).double().not_null())
                    .col(ColumnDef::new(GpsPoints::Latitude).double().not_null())
                    .col(ColumnDef::new(GpsPoints::Altitude).double().null())
                    .col(ColumnDef::new(GpsPoints::Speed).double().null())
                    .col(
                        ColumnDef::new(GpsPoints::CreateTime)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Last-point refresh scans the newest row per serial.
        manager
            .get_connection()
            .execute(Statement::from_string(
                manager.get_database_backend(),
                "CREATE INDEX IF NOT EXISTS idx_gps_points_sn_created ON gps_points (sn, create_time DESC)"
                    .to_string(),
            ))
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_gps_points_sys_org")
                    .table(GpsPoints::Table)
                    .col(GpsPoints::SysId)
                    .col(GpsPoints::OrgId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GpsPoints::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum GpsPoints {
    Table,
    Id,
    SysId,
    OrgId,
    Sn,
    Longitude,
    Latitude,
    Altitude,
    Speed,
    CreateTime,
}
