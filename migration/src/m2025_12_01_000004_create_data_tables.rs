//! Migration to create the five template-bindable data tables.
//!
//! form_data, orgs, customers, goods and services share the same layout:
//! intrinsic tenant/partition columns plus pre-allocated generic "spare"
//! columns (field_NN, text_NN, date_NN, datetime_NN, int_NN, float_NN) that
//! templates re-use instead of running structural migrations. The spare
//! ranges here must match the physical-column catalog in the server crate.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const DATA_TABLES: &[(&str, bool, bool)] = &[
    // (table, has_gps_sn, has_user_refs)
    ("form_data", false, true),
    ("orgs", true, false),
    ("customers", true, false),
    ("goods", true, false),
    ("services", false, false),
];

fn col(name: &str) -> Alias {
    Alias::new(name)
}

fn build_data_table(table: &str, has_gps_sn: bool, has_user_refs: bool) -> TableCreateStatement {
    let mut stmt = Table::create();
    stmt.table(col(table))
        .if_not_exists()
        .col(ColumnDef::new(col("id")).string_len(32).not_null().primary_key())
        .col(ColumnDef::new(col("sys_id")).integer().not_null().default(1))
        .col(ColumnDef::new(col("org_id")).integer().not_null().default(1))
        .col(ColumnDef::new(col("biz_id")).integer().not_null().default(1))
        .col(ColumnDef::new(col("src_id")).integer().not_null().default(0))
        .col(ColumnDef::new(col("template_id")).string_len(32).null())
        .col(ColumnDef::new(col("obj_id")).string_len(32).null())
        .col(
            ColumnDef::new(col("create_time"))
                .timestamp_with_time_zone()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .col(ColumnDef::new(col("longitude")).double().null())
        .col(ColumnDef::new(col("latitude")).double().null())
        .col(ColumnDef::new(col("altitude")).double().null());

    if has_user_refs {
        stmt.col(ColumnDef::new(col("parent_id")).string_len(32).null())
            .col(ColumnDef::new(col("user_id")).string_len(32).null())
            .col(ColumnDef::new(col("department_id")).string_len(32).null());
    }

    if has_gps_sn {
        stmt.col(ColumnDef::new(col("gps_sn")).string_len(256).null());
    }

    if table != "form_data" {
        stmt.col(ColumnDef::new(col("name")).string_len(256).null())
            .col(ColumnDef::new(col("status")).string_len(128).null())
            .col(ColumnDef::new(col("phone")).string_len(32).null())
            .col(ColumnDef::new(col("mail")).string_len(255).null())
            .col(ColumnDef::new(col("address")).string_len(512).null())
            .col(ColumnDef::new(col("remark")).text().null());
    }

    for n in 1..=50u8 {
        stmt.col(
            ColumnDef::new(col(&format!("field_{n:02}")))
                .string_len(1023)
                .null(),
        );
    }
    stmt.col(ColumnDef::new(col("text_01")).text().null());
    for n in 1..=10u8 {
        stmt.col(ColumnDef::new(col(&format!("date_{n:02}"))).date().null());
    }
    for n in 1..=10u8 {
        stmt.col(
            ColumnDef::new(col(&format!("datetime_{n:02}")))
                .timestamp_with_time_zone()
                .null(),
        );
    }
    for n in 1..=20u8 {
        stmt.col(ColumnDef::new(col(&format!("int_{n:02}"))).big_integer().null());
    }
    for n in 1..=10u8 {
        stmt.col(
            ColumnDef::new(col(&format!("float_{n:02}")))
                .decimal_len(16, 4)
                .null(),
        );
    }

    stmt.to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (table, has_gps_sn, has_user_refs) in DATA_TABLES {
            manager
                .create_table(build_data_table(table, *has_gps_sn, *has_user_refs))
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name(format!("idx_{table}_template"))
                        .table(col(table))
                        .col(col("template_id"))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name(format!("idx_{table}_sys_org"))
                        .table(col(table))
                        .col(col("sys_id"))
                        .col(col("org_id"))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name(format!("idx_{table}_src"))
                        .table(col(table))
                        .col(col("src_id"))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name(format!("idx_{table}_obj"))
                        .table(col(table))
                        .col(col("obj_id"))
                        .to_owned(),
                )
                .await?;

            if *has_gps_sn {
                manager
                    .create_index(
                        Index::create()
                            .name(format!("idx_{table}_gps_sn"))
                            .table(col(table))
                            .col(col("gps_sn"))
                            .to_owned(),
                    )
                    .await?;
            }
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (table, _, _) in DATA_TABLES.iter().rev() {
            manager
                .drop_table(Table::drop().table(col(table)).to_owned())
                .await?;
        }
        Ok(())
    }
}
