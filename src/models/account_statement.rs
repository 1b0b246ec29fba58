//! Account statement entity model: one ledger row per balance movement.

use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Statement record types.
pub const RECORD_INCOME: &str = "income";
pub const RECORD_EXPENSE: &str = "expense";
pub const RECORD_LOCK: &str = "lock";
pub const RECORD_PAYMENT: &str = "payment";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "account_statements")]
pub struct Model {
    /// Prefixed snowflake primary key (`ACCS...`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub sys_id: i32,
    pub org_id: i32,
    pub biz_id: i32,
    pub src_id: i32,
    pub account_id: String,
    /// Which balance slot the movement applies to (acc_1/acc_2/acc_3/points)
    pub acc_name: Option<String>,
    /// income, expense, lock, payment
    pub record_type: String,
    pub amount: Decimal,
    pub order_num: Option<String>,
    pub remark: Option<String>,
    pub create_time: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::AccountId",
        to = "super::account::Column::Id"
    )]
    Account,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
