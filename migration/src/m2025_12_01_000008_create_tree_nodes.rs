//! Migration to create the tree_nodes table.
//!
//! One adjacency-list table backs the category, org and permission trees,
//! distinguished by kind. sort_num orders siblings; move/copy operations
//! rewrite parent_id and sort_num only.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TreeNodes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TreeNodes::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TreeNodes::SysId).integer().not_null().default(1))
                    .col(ColumnDef::new(TreeNodes::OrgId).integer().not_null().default(1))
                    .col(
                        ColumnDef::new(TreeNodes::Kind)
                            .string_len(32)
                            .not_null()
                            .default("category"),
                    )
                    .col(ColumnDef::new(TreeNodes::ParentId).string_len(32).null())
                    .col(ColumnDef::new(TreeNodes::Name).string_len(255).not_null())
                    .col(ColumnDef::new(TreeNodes::SortNum).integer().not_null().default(1))
                    .col(ColumnDef::new(TreeNodes::Data).text().null())
                    .col(
                        ColumnDef::new(TreeNodes::CreateTime)
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
                    .name("idx_tree_nodes_parent")
                    .table(TreeNodes::Table)
                    .col(TreeNodes::ParentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tree_nodes_sys_kind")
                    .table(TreeNodes::Table)
                    .col(TreeNodes::SysId)
                    .col(TreeNodes::Kind)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TreeNodes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TreeNodes {
    Table,
    Id,
    SysId,
    OrgId,
    Kind,
    ParentId,
    Name,
    SortNum,
    Data,
    CreateTime,
}
