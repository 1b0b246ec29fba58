//! Account entity model: three named balance slots plus a points balance,
//! owned by a template-bound row via obj_id.

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    /// Prefixed snowflake primary key (`ACC...`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub sys_id: i32,
    pub org_id: i32,
    pub biz_id: i32,
    pub src_id: i32,
    pub user_id: Option<String>,
    /// Owning object (row in a template-bound table)
    pub obj_id: Option<String>,
    pub acc_1_name: Option<String>,
    pub acc_1_type: Option<String>,
    pub acc_1_balance: Decimal,
    pub acc_1_lock: Decimal,
    pub acc_2_name: Option<String>,
    pub acc_2_type: Option<String>,
    pub acc_2_balance: Decimal,
    pub acc_2_lock: Decimal,
    pub acc_3_name: Option<String>,
    pub acc_3_type: Option<String>,
    pub acc_3_balance: Decimal,
    pub acc_3_lock: Decimal,
    pub points_name: Option<String>,
    pub points_balance: Decimal,
    pub create_time: DateTimeWithTimeZone,
    pub update_time: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::account_statement::Entity")]
    Statements,
}

impl Related<super::account_statement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Statements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
