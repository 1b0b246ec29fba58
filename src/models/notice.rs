//! Notice entity model.
//!
//! send_status/send_error persist delivery outcomes for operator visibility;
//! failed sends are not retried automatically.

use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Delivery states.
pub const SEND_PENDING: &str = "pending";
pub const SEND_SENT: &str = "sent";
pub const SEND_FAILED: &str = "failed";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "notices")]
pub struct Model {
    /// Prefixed snowflake primary key (`N...`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub sys_id: i32,
    pub org_id: i32,
    pub biz_id: i32,
    pub src_id: i32,
    pub title: String,
    pub content: Option<String>,
    /// system, sms, email
    pub notice_type: String,
    pub target_user_id: Option<String>,
    pub target_phone: Option<String>,
    pub target_email: Option<String>,
    pub is_read: bool,
    /// pending, sent, failed
    pub send_status: String,
    pub send_error: Option<String>,
    pub create_time: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
