//! System log entity model: the audit trail written by data mutations.

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "system_logs")]
pub struct Model {
    /// Prefixed snowflake primary key (`L...`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub sys_id: i32,
    pub org_id: i32,
    pub log_level: i32,
    /// delete, update, bulk_delete, bulk_update
    pub log_type: String,
    pub template_id: Option<String>,
    /// Acting username, or the client IP for anonymous callers
    pub user_name: Option<String>,
    pub content: Option<String>,
    pub create_time: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
