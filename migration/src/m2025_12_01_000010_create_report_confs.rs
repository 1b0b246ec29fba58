//! Migration to create the report_confs table.
//!
//! Report configurations select a template and describe columns, parameters,
//! group-by and aggregates as JSON; execution compiles them into bound
//! queries against the template's table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReportConfs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReportConfs::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ReportConfs::SysId).integer().not_null().default(1))
                    .col(ColumnDef::new(ReportConfs::OrgId).integer().not_null().default(1))
                    .col(ColumnDef::new(ReportConfs::BizId).integer().not_null().default(1))
                    .col(ColumnDef::new(ReportConfs::SrcId).integer().not_null().default(1))
                    .col(
                        ColumnDef::new(ReportConfs::ReportId)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(ReportConfs::ReportName).string_len(31).null())
                    .col(ColumnDef::new(ReportConfs::ReportRemark).text().null())
                    .col(ColumnDef::new(ReportConfs::TemplateId).string_len(32).null())
                    .col(ColumnDef::new(ReportConfs::Arguments).text().null())
                    .col(ColumnDef::new(ReportConfs::DataStruct).text().null())
                    .col(ColumnDef::new(ReportConfs::ChartsStruct).text().null())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReportConfs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ReportConfs {
    Table,
    Id,
    SysId,
    OrgId,
    BizId,
    SrcId,
    ReportId,
    ReportName,
    ReportRemark,
    TemplateId,
    Arguments,
    DataStruct,
    ChartsStruct,
}
