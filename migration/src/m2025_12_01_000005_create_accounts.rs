//! Migration to create the accounts and account_statements tables.
//!
//! Accounts keep three named balance slots plus a points balance; statements
//! are the ledger rows whose posting adjusts the owning account in the same
//! transaction.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accounts::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Accounts::SysId).integer().not_null().default(1))
                    .col(ColumnDef::new(Accounts::OrgId).integer().not_null().default(1))
                    .col(ColumnDef::new(Accounts::BizId).integer().not_null().default(1))
                    .col(ColumnDef::new(Accounts::SrcId).integer().not_null().default(1))
                    .col(ColumnDef::new(Accounts::UserId).string_len(32).null())
                    .col(ColumnDef::new(Accounts::ObjId).string_len(64).null())
                    .col(ColumnDef::new(Accounts::Acc1Name).string_len(64).null())
                    .col(ColumnDef::new(Accounts::Acc1Type).string_len(64).null())
                    .col(
                        ColumnDef::new(Accounts::Acc1Balance)
                            .decimal_len(14, 3)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Accounts::Acc1Lock)
                            .decimal_len(14, 3)
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Accounts::Acc2Name).string_len(64).null())
                    .col(ColumnDef::new(Accounts::Acc2Type).string_len(64).null())
                    .col(
                        ColumnDef::new(Accounts::Acc2Balance)
                            .decimal_len(14, 3)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Accounts::Acc2Lock)
                            .decimal_len(14, 3)
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Accounts::Acc3Name).string_len(64).null())
                    .col(ColumnDef::new(Accounts::Acc3Type).string_len(64).null())
                    .col(
                        ColumnDef::new(Accounts::Acc3Balance)
                            .decimal_len(14, 3)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Accounts::Acc3Lock)
                            .decimal_len(14, 3)
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Accounts::PointsName).string_len(64).null())
                    .col(
                        ColumnDef::new(Accounts::PointsBalance)
                            .decimal_len(14, 3)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Accounts::CreateTime)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Accounts::UpdateTime)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_accounts_obj")
                    .table(Accounts::Table)
                    .col(Accounts::ObjId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AccountStatements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AccountStatements::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AccountStatements::SysId)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(AccountStatements::OrgId)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(AccountStatements::BizId)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(AccountStatements::SrcId)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(AccountStatements::AccountId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AccountStatements::AccName)
                            .string_len(64)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(AccountStatements::RecordType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AccountStatements::Amount)
                            .decimal_len(14, 3)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AccountStatements::OrderNum)
                            .string_len(64)
                            .null(),
                    )
                    .col(ColumnDef::new(AccountStatements::Remark).string_len(255).null())
                    .col(
                        ColumnDef::new(AccountStatements::CreateTime)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_account_statements_account_id")
                            .from(AccountStatements::Table, AccountStatements::AccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_account_statements_account")
                    .table(AccountStatements::Table)
                    .col(AccountStatements::AccountId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AccountStatements::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Accounts {
    Table,
    Id,
    SysId,
    OrgId,
    BizId,
    SrcId,
    UserId,
    ObjId,
    #[sea_orm(iden = "acc_1_name")]
    Acc1Name,
    #[sea_orm(iden = "acc_1_type")]
    Acc1Type,
    #[sea_orm(iden = "acc_1_balance")]
    Acc1Balance,
    #[sea_orm(iden = "acc_1_lock")]
    Acc1Lock,
    #[sea_orm(iden = "acc_2_name")]
    Acc2Name,
    #[sea_orm(iden = "acc_2_type")]
    Acc2Type,
    #[sea_orm(iden = "acc_2_balance")]
    Acc2Balance,
    #[sea_orm(iden = "acc_2_lock")]
    Acc2Lock,
    #[sea_orm(iden = "acc_3_name")]
    Acc3Name,
    #[sea_orm(iden = "acc_3_type")]
    Acc3Type,
    #[sea_orm(iden = "acc_3_balance")]
    Acc3Balance,
    #[sea_orm(iden = "acc_3_lock")]
    Acc3Lock,
    PointsName,
    PointsBalance,
    CreateTime,
    UpdateTime,
}

#[derive(DeriveIden)]
enum AccountStatements {
    Table,
    Id,
    SysId,
    OrgId,
    BizId,
    SrcId,
    AccountId,
    AccName,
    RecordType,
    Amount,
    OrderNum,
    Remark,
    CreateTime,
}
