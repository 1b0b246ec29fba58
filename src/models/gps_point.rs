//! GPS point entity model: raw track points keyed by device serial.

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "gps_points")]
pub struct Model {
    /// Prefixed snowflake primary key (`P...`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub sys_id: i32,
    pub org_id: i32,
    /// Device serial; org/customer/goods rows reference it via gps_sn
    pub sn: String,
    pub longitude: f64,
    pub latitude: f64,
    pub altitude: Option<f64>,
    pub speed: Option<f64>,
    pub create_time: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
