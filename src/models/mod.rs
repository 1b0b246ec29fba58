//! # Data Models
//!
//! SeaORM entity models for the structured tables. The five template-bound
//! data tables have no static entities; the engine's catalog and query
//! builder cover them, since their logical schema is runtime data.

pub mod account;
pub mod account_statement;
pub mod form_aggregate_field;
pub mod form_field;
pub mod form_m2m;
pub mod form_template;
pub mod gps_point;
pub mod notice;
pub mod report_conf;
pub mod system_log;
pub mod tree_node;
pub mod user;

pub use account::Entity as Account;
pub use account_statement::Entity as AccountStatement;
pub use form_aggregate_field::Entity as FormAggregateField;
pub use form_field::Entity as FormField;
pub use form_m2m::Entity as FormM2m;
pub use form_template::Entity as FormTemplate;
pub use gps_point::Entity as GpsPoint;
pub use notice::Entity as Notice;
pub use report_conf::Entity as ReportConf;
pub use system_log::Entity as SystemLog;
pub use tree_node::Entity as TreeNode;
pub use user::Entity as User;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Basic service information returned by the root endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// Service name
    pub name: String,
    /// Service version
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            name: "formbase".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
