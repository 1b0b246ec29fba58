//! Report configuration entity model.
//!
//! arguments/data_struct/charts_struct hold JSON definitions; execution
//! compiles them into allowlisted, parameter-bound queries through the
//! owning template's plan.

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "report_confs")]
pub struct Model {
    /// Prefixed snowflake primary key (`R...`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub sys_id: i32,
    pub org_id: i32,
    pub biz_id: i32,
    pub src_id: i32,
    /// Public numeric handle used in report URLs
    pub report_id: i32,
    pub report_name: Option<String>,
    pub report_remark: Option<String>,
    pub template_id: Option<String>,
    /// Parameter definitions (JSON)
    pub arguments: Option<String>,
    /// Output column definitions (JSON)
    pub data_struct: Option<String>,
    /// Chart definitions passed through to clients (JSON)
    pub charts_struct: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
