//! Migration to create the notices table.
//!
//! Delivery failures persist on the row (send_status/send_error) for operator
//! visibility; there is no automatic retry.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Notices::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Notices::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Notices::SysId).integer().not_null().default(1))
                    .col(ColumnDef::new(Notices::OrgId).integer().not_null().default(1))
                    .col(ColumnDef::new(Notices::BizId).integer().not_null().default(1))
                    .col(ColumnDef::new(Notices::SrcId).integer().not_null().default(1))
                    .col(ColumnDef::new(Notices::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Notices::Content).text().null())
                    .col(
                        ColumnDef::new(Notices::NoticeType)
                            .string_len(16)
                            .not_null()
                            .default("system"),
                    )
                    .col(ColumnDef::new(Notices::TargetUserId).string_len(32).null())
                    .col(ColumnDef::new(Notices::TargetPhone).string_len(32).null())
                    .col(ColumnDef::new(Notices::TargetEmail).string_len(255).null())
                    .col(
                        ColumnDef::new(Notices::IsRead)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Notices::SendStatus)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Notices::SendError).text().null())
                    .col(
                        ColumnDef::new(Notices::CreateTime)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notices_sys_org")
                    .table(Notices::Table)
                    .col(Notices::SysId)
                    .col(Notices::OrgId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notices_target_user")
                    .table(Notices::Table)
                    .col(Notices::TargetUserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notices::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Notices {
    Table,
    Id,
    SysId,
    OrgId,
    BizId,
    SrcId,
    Title,
    Content,
    NoticeType,
    TargetUserId,
    TargetPhone,
    TargetEmail,
    IsRead,
    SendStatus,
    SendError,
    CreateTime,
}
