//! Database migrations for the Formbase API.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_12_01_000001_create_users;
mod m2025_12_01_000002_create_form_templates;
mod m2025_12_01_000003_create_form_fields;
mod m2025_12_01_000004_create_data_tables;
mod m2025_12_01_000005_create_accounts;
mod m2025_12_01_000006_create_notices;
mod m2025_12_01_000007_create_gps_points;
mod m2025_12_01_000008_create_tree_nodes;
mod m2025_12_01_000009_create_system_logs;
mod m2025_12_01_000010_create_report_confs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_12_01_000001_create_users::Migration),
            Box::new(m2025_12_01_000002_create_form_templates::Migration),
            Box::new(m2025_12_01_000003_create_form_fields::Migration),
            Box::new(m2025_12_01_000004_create_data_tables::Migration),
            Box::new(m2025_12_01_000005_create_accounts::Migration),
            Box::new(m2025_12_01_000006_create_notices::Migration),
            Box::new(m2025_12_01_000007_create_gps_points::Migration),
            Box::new(m2025_12_01_000008_create_tree_nodes::Migration),
            Box::new(m2025_12_01_000009_create_system_logs::Migration),
            Box::new(m2025_12_01_000010_create_report_confs::Migration),
        ]
    }
}
