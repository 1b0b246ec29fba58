//! Form template entity model.
//!
//! A template selects one physical table via api_name, carries the tenant
//! identifiers every data row inherits, and owns an ordered set of field
//! descriptors. Its current field set fully determines the logical schema of
//! its data rows.

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "form_templates")]
pub struct Model {
    /// Prefixed snowflake primary key (`FT...`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub sys_id: i32,
    pub org_id: i32,
    pub biz_id: i32,
    pub src_id: i32,
    /// Category tree node id (optional)
    pub category: Option<String>,
    pub api_version: String,
    /// Selects the physical table: formdata, org, customer, goods, services
    pub api_name: String,
    pub title: String,
    pub form_type: i32,
    pub sort_num: i32,
    pub keyword: Option<String>,
    pub remark: Option<String>,
    pub parent_id: Option<String>,
    /// Copy provenance
    pub from_template_id: Option<String>,
    pub need_login: bool,
    pub create_time: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::form_field::Entity")]
    Fields,
    #[sea_orm(has_many = "super::form_aggregate_field::Entity")]
    AggregateFields,
}

impl Related<super::form_field::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Fields.def()
    }
}

impl Related<super::form_aggregate_field::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AggregateFields.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// The REST path this template's data is served under.
    pub fn api_path(&self) -> String {
        format!("/api/{}/{}/", self.api_version, self.api_name)
    }
}
