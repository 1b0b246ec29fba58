//! User entity model.

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Prefixed snowflake primary key (`U...`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub sys_id: i32,
    pub org_id: i32,
    pub username: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// HMAC-SHA256 digest of the password, hex encoded
    #[serde(skip_serializing)]
    pub password_digest: Option<String>,
    #[serde(skip_serializing)]
    pub password_salt: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
    pub create_time: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
