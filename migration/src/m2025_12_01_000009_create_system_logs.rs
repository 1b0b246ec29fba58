//! Migration to create the system_logs audit table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SystemLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SystemLogs::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SystemLogs::SysId).integer().not_null().default(1))
                    .col(ColumnDef::new(SystemLogs::OrgId).integer().not_null().default(1))
                    .col(ColumnDef::new(SystemLogs::LogLevel).integer().not_null().default(0))
                    .col(ColumnDef::new(SystemLogs::LogType).string_len(32).not_null())
                    .col(ColumnDef::new(SystemLogs::TemplateId).string_len(32).null())
                    .col(ColumnDef::new(SystemLogs::UserName).string_len(150).null())
                    .col(ColumnDef::new(SystemLogs::Content).text().null())
                    .col(
                        ColumnDef::new(SystemLogs::CreateTime)
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
                    .name("idx_system_logs_template")
                    .table(SystemLogs::Table)
                    .col(SystemLogs::TemplateId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SystemLogs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SystemLogs {
    Table,
    Id,
    SysId,
    OrgId,
    LogLevel,
    LogType,
    TemplateId,
    UserName,
    Content,
    CreateTime,
}
