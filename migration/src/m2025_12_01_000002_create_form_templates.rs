//! Migration to create the form_templates table.
//!
//! A template selects one physical table via api_name and owns an ordered set
//! of field descriptors; templates form a parent/child hierarchy and record
//! copy provenance through from_template_id.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FormTemplates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FormTemplates::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FormTemplates::SysId)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(FormTemplates::OrgId)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(FormTemplates::BizId)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(FormTemplates::SrcId)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(FormTemplates::Category).string_len(64).null())
                    .col(
                        ColumnDef::new(FormTemplates::ApiVersion)
                            .string_len(128)
                            .not_null()
                            .default("v1"),
                    )
                    .col(
                        ColumnDef::new(FormTemplates::ApiName)
                            .string_len(128)
                            .not_null()
                            .default("formdata"),
                    )
                    .col(ColumnDef::new(FormTemplates::Title).string_len(127).not_null())
                    .col(
                        ColumnDef::new(FormTemplates::FormType)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(FormTemplates::SortNum)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(FormTemplates::Keyword).string_len(255).null())
                    .col(ColumnDef::new(FormTemplates::Remark).string_len(1023).null())
                    .col(ColumnDef::new(FormTemplates::ParentId).string_len(32).null())
                    .col(
                        ColumnDef::new(FormTemplates::FromTemplateId)
                            .string_len(32)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(FormTemplates::NeedLogin)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(FormTemplates::CreateTime)
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
                    .name("idx_form_templates_sys_org")
                    .table(FormTemplates::Table)
                    .col(FormTemplates::SysId)
                    .col(FormTemplates::OrgId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_form_templates_keyword")
                    .table(FormTemplates::Table)
                    .col(FormTemplates::Keyword)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FormTemplates::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum FormTemplates {
    Table,
    Id,
    SysId,
    OrgId,
    BizId,
    SrcId,
    Category,
    ApiVersion,
    ApiName,
    Title,
    FormType,
    SortNum,
    Keyword,
    Remark,
    ParentId,
    FromTemplateId,
    NeedLogin,
    CreateTime,
}
