//! Generic two-column association rows faking many-to-many relations
//! between arbitrary template-bound rows.

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "form_m2m")]
pub struct Model {
    /// Prefixed snowflake primary key (`MTM...`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub from_id: String,
    pub to_id: String,
    /// The field descriptor that created the association
    pub from_field_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
