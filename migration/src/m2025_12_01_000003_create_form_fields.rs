//! Migration to create form_fields, form_aggregate_fields and form_m2m tables.
//!
//! Field descriptors map a template alias onto a physical column of the
//! template's target table; aggregate fields configure the aggregate endpoint;
//! form_m2m is the generic two-column association table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FormFields::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FormFields::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FormFields::SysId).integer().not_null().default(1))
                    .col(ColumnDef::new(FormFields::OrgId).integer().not_null().default(1))
                    .col(ColumnDef::new(FormFields::BizId).integer().not_null().default(1))
                    .col(ColumnDef::new(FormFields::SrcId).integer().not_null().default(1))
                    .col(ColumnDef::new(FormFields::TemplateId).string_len(32).not_null())
                    .col(ColumnDef::new(FormFields::ColTitle).string_len(256).not_null())
                    .col(
                        ColumnDef::new(FormFields::Alias)
                            .string_len(256)
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(FormFields::ColName).string_len(255).not_null())
                    .col(
                        ColumnDef::new(FormFields::InFilter)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(FormFields::IsRequired)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(FormFields::Widget).string_len(16).null())
                    .col(ColumnDef::new(FormFields::WidgetAttr).string_len(255).null())
                    .col(ColumnDef::new(FormFields::VerifyExp).string_len(255).null())
                    .col(
                        ColumnDef::new(FormFields::RelatedTemplateId)
                            .string_len(32)
                            .null(),
                    )
                    .col(ColumnDef::new(FormFields::LocalDataSource).text().null())
                    .col(ColumnDef::new(FormFields::SortNum).integer().not_null().default(1))
                    .col(
                        ColumnDef::new(FormFields::IsRelated)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(FormFields::Desc).string_len(255).null())
                    .col(
                        ColumnDef::new(FormFields::UniqueInOrg)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_form_fields_template_id")
                            .from(FormFields::Table, FormFields::TemplateId)
                            .to(FormTemplates::Table, FormTemplates::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_form_fields_template")
                    .table(FormFields::Table)
                    .col(FormFields::TemplateId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FormAggregateFields::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FormAggregateFields::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FormAggregateFields::SysId)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(FormAggregateFields::OrgId)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(FormAggregateFields::BizId)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(FormAggregateFields::SrcId)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(FormAggregateFields::TemplateId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FormAggregateFields::FieldId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FormAggregateFields::AggrType)
                            .string_len(128)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(FormAggregateFields::AggrName)
                            .string_len(128)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(FormAggregateFields::Description)
                            .string_len(1023)
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_form_aggregate_fields_template")
                    .table(FormAggregateFields::Table)
                    .col(FormAggregateFields::TemplateId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FormM2m::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FormM2m::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FormM2m::FromId).string_len(32).not_null())
                    .col(ColumnDef::new(FormM2m::ToId).string_len(32).not_null())
                    .col(ColumnDef::new(FormM2m::FromFieldId).string_len(32).null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_form_m2m_from")
                    .table(FormM2m::Table)
                    .col(FormM2m::FromId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_form_m2m_to")
                    .table(FormM2m::Table)
                    .col(FormM2m::ToId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FormM2m::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FormAggregateFields::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FormFields::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum FormFields {
    Table,
    Id,
    SysId,
    OrgId,
    BizId,
    SrcId,
    TemplateId,
    ColTitle,
    Alias,
    ColName,
    InFilter,
    IsRequired,
    Widget,
    WidgetAttr,
    VerifyExp,
    RelatedTemplateId,
    LocalDataSource,
    SortNum,
    IsRelated,
    Desc,
    UniqueInOrg,
}

#[derive(DeriveIden)]
enum FormAggregateFields {
    Table,
    Id,
    SysId,
    OrgId,
    BizId,
    SrcId,
    TemplateId,
    FieldId,
    AggrType,
    AggrName,
    Description,
}

#[derive(DeriveIden)]
enum FormM2m {
    Table,
    Id,
    FromId,
    ToId,
    FromFieldId,
}

#[derive(DeriveIden)]
enum FormTemplates {
    Table,
    Id,
}
