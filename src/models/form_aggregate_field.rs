//! Aggregate field entity model: configures the aggregate endpoint output
//! per template (count/sum/avg/min/max over one field).

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "form_aggregate_fields")]
pub struct Model {
    /// Prefixed snowflake primary key (`FA...`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub sys_id: i32,
    pub org_id: i32,
    pub biz_id: i32,
    pub src_id: i32,
    pub template_id: String,
    pub field_id: String,
    /// count, sum, avg, min, max
    pub aggr_type: Option<String>,
    /// Output key in the aggregate response
    pub aggr_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::form_template::Entity",
        from = "Column::TemplateId",
        to = "super::form_template::Column::Id"
    )]
    Template,
}

impl Related<super::form_template::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Template.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
