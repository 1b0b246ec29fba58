//! Form field entity model.
//!
//! One descriptor per template field: the physical column it re-uses, its
//! display alias, widget hints, validation expression and the filter/unique
//! flags the engine compiles into the template plan.

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "form_fields")]
pub struct Model {
    /// Prefixed snowflake primary key (`FF...`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub sys_id: i32,
    pub org_id: i32,
    pub biz_id: i32,
    pub src_id: i32,
    pub template_id: String,
    /// Human-readable field meaning
    pub col_title: String,
    /// Display alias; empty means the column name is used as-is
    pub alias: String,
    /// Physical column name on the target table
    pub col_name: String,
    pub in_filter: bool,
    pub is_required: bool,
    pub widget: Option<String>,
    pub widget_attr: Option<String>,
    /// Regex the bound value must match
    pub verify_exp: Option<String>,
    /// Related template resolved through obj_id, one level only
    pub related_template_id: Option<String>,
    /// In-field data source definition (JSON)
    pub local_data_source: Option<String>,
    pub sort_num: i32,
    /// Resolves on the related template's table instead of the own table
    pub is_related: bool,
    pub desc: Option<String>,
    /// Unique within (org_id, template_id, sys_id)
    pub unique_in_org: bool,
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

impl Model {
    /// Final alias: alias if non-empty, else the column name.
    pub fn field_alias(&self) -> &str {
        if self.alias.is_empty() {
            &self.col_name
        } else {
            &self.alias
        }
    }
}
