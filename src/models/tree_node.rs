//! Tree node entity model.
//!
//! One adjacency-list table backs the category, org and permission trees;
//! kind distinguishes them. sort_num orders siblings.

use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Known tree kinds.
pub const KIND_CATEGORY: &str = "category";
pub const KIND_ORG: &str = "org";
pub const KIND_PERMISSION: &str = "permission";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "tree_nodes")]
pub struct Model {
    /// Prefixed snowflake primary key (`T...`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub sys_id: i32,
    pub org_id: i32,
    pub kind: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub sort_num: i32,
    /// Free-form JSON payload attached to the node
    pub data: Option<String>,
    pub create_time: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
