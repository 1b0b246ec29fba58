//! Physical-column catalog for the template-bindable tables.
//!
//! The five data tables never change shape at runtime; templates re-use the
//! pre-allocated spare columns instead. The catalog here is the engine's view
//! of that fixed layout and must match the data-table migration: intrinsic
//! columns per table plus the shared spare ranges (field_01..50, text_01,
//! date_01..10, datetime_01..10, int_01..20, float_01..10).

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// The fixed set of physical tables a template can bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetModel {
    FormData,
    Org,
    Customer,
    Goods,
    Services,
}

impl TargetModel {
    /// All bindable targets, in catalog order.
    pub const ALL: [TargetModel; 5] = [
        TargetModel::FormData,
        TargetModel::Org,
        TargetModel::Customer,
        TargetModel::Goods,
        TargetModel::Services,
    ];

    /// Resolve a template's api_name to its target table.
    pub fn from_api_name(api_name: &str) -> Option<Self> {
        match api_name {
            "formdata" => Some(TargetModel::FormData),
            "org" => Some(TargetModel::Org),
            "customer" => Some(TargetModel::Customer),
            "goods" => Some(TargetModel::Goods),
            "services" => Some(TargetModel::Services),
            _ => None,
        }
    }

    pub fn api_name(&self) -> &'static str {
        match self {
            TargetModel::FormData => "formdata",
            TargetModel::Org => "org",
            TargetModel::Customer => "customer",
            TargetModel::Goods => "goods",
            TargetModel::Services => "services",
        }
    }

    pub fn table_name(&self) -> &'static str {
        match self {
            TargetModel::FormData => "form_data",
            TargetModel::Org => "orgs",
            TargetModel::Customer => "customers",
            TargetModel::Goods => "goods",
            TargetModel::Services => "services",
        }
    }

    /// Primary key prefix used by the ID generator for this table.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            TargetModel::FormData => "D",
            TargetModel::Org => "O",
            TargetModel::Customer => "C",
            TargetModel::Goods => "G",
            TargetModel::Services => "S",
        }
    }

    /// Whether rows in this table carry a GPS device serial.
    pub fn has_gps_sn(&self) -> bool {
        matches!(
            self,
            TargetModel::Org | TargetModel::Customer | TargetModel::Goods
        )
    }

    /// Whether rows apply the `src_id = org_id % 100` partitioning convention.
    pub fn is_partitioned(&self) -> bool {
        matches!(self, TargetModel::FormData)
    }

    /// The catalog of physical columns for this table.
    pub fn catalog(&self) -> &'static TableCatalog {
        let catalogs = CATALOGS.get_or_init(build_catalogs);
        &catalogs[*self as usize]
    }

    /// Look up a physical column by name.
    pub fn column(&self, name: &str) -> Option<&'static PhysicalColumn> {
        self.catalog().column(name)
    }
}

/// Value shape of a physical column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Text,
    LongText,
    Integer,
    Decimal,
    Double,
    Bool,
    Date,
    DateTime,
}

impl ColumnKind {
    /// Numeric kinds support `_range_min`/`_range_max` filters.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnKind::Integer | ColumnKind::Decimal | ColumnKind::Double
        )
    }

    /// Temporal kinds support `_after`/`_before` filters.
    pub fn is_temporal(&self) -> bool {
        matches!(self, ColumnKind::Date | ColumnKind::DateTime)
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, ColumnKind::Text | ColumnKind::LongText)
    }
}

/// A single physical column of a data table.
#[derive(Debug, Clone)]
pub struct PhysicalColumn {
    pub name: String,
    pub kind: ColumnKind,
}

/// Column catalog for one data table.
#[derive(Debug)]
pub struct TableCatalog {
    columns: Vec<PhysicalColumn>,
    by_name: HashMap<String, usize>,
}

impl TableCatalog {
    fn new(columns: Vec<PhysicalColumn>) -> Self {
        let by_name = columns
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.name.clone(), idx))
            .collect();
        Self { columns, by_name }
    }

    pub fn column(&self, name: &str) -> Option<&PhysicalColumn> {
        self.by_name.get(name).map(|idx| &self.columns[*idx])
    }

    pub fn columns(&self) -> &[PhysicalColumn] {
        &self.columns
    }
}

static CATALOGS: OnceLock<Vec<TableCatalog>> = OnceLock::new();

fn push(columns: &mut Vec<PhysicalColumn>, name: &str, kind: ColumnKind) {
    columns.push(PhysicalColumn {
        name: name.to_string(),
        kind,
    });
}

fn build_catalog(target: TargetModel) -> TableCatalog {
    let mut columns = Vec::new();

    push(&mut columns, "id", ColumnKind::Text);
    push(&mut columns, "sys_id", ColumnKind::Integer);
    push(&mut columns, "org_id", ColumnKind::Integer);
    push(&mut columns, "biz_id", ColumnKind::Integer);
    push(&mut columns, "src_id", ColumnKind::Integer);
    push(&mut columns, "template_id", ColumnKind::Text);
    push(&mut columns, "obj_id", ColumnKind::Text);
    push(&mut columns, "create_time", ColumnKind::DateTime);
    push(&mut columns, "longitude", ColumnKind::Double);
    push(&mut columns, "latitude", ColumnKind::Double);
    push(&mut columns, "altitude", ColumnKind::Double);

    if target == TargetModel::FormData {
        push(&mut columns, "parent_id", ColumnKind::Text);
        push(&mut columns, "user_id", ColumnKind::Text);
        push(&mut columns, "department_id", ColumnKind::Text);
    } else {
        push(&mut columns, "name", ColumnKind::Text);
        push(&mut columns, "status", ColumnKind::Text);
        push(&mut columns, "phone", ColumnKind::Text);
        push(&mut columns, "mail", ColumnKind::Text);
        push(&mut columns, "address", ColumnKind::Text);
        push(&mut columns, "remark", ColumnKind::LongText);
    }

    if target.has_gps_sn() {
        push(&mut columns, "gps_sn", ColumnKind::Text);
    }

    for n in 1..=50u8 {
        push(&mut columns, &format!("field_{n:02}"), ColumnKind::Text);
    }
    push(&mut columns, "text_01", ColumnKind::LongText);
    for n in 1..=10u8 {
        push(&mut columns, &format!("date_{n:02}"), ColumnKind::Date);
    }
    for n in 1..=10u8 {
        push(&mut columns, &format!("datetime_{n:02}"), ColumnKind::DateTime);
    }
    for n in 1..=20u8 {
        push(&mut columns, &format!("int_{n:02}"), ColumnKind::Integer);
    }
    for n in 1..=10u8 {
        push(&mut columns, &format!("float_{n:02}"), ColumnKind::Decimal);
    }

    TableCatalog::new(columns)
}

fn build_catalogs() -> Vec<TableCatalog> {
    TargetModel::ALL.iter().map(|t| build_catalog(*t)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_name_round_trip() {
        for target in TargetModel::ALL {
            assert_eq!(TargetModel::from_api_name(target.api_name()), Some(target));
        }
        assert_eq!(TargetModel::from_api_name("widgets"), None);
    }

    #[test]
    fn test_spare_column_ranges() {
        let catalog = TargetModel::FormData.catalog();
        assert_eq!(catalog.column("field_01").unwrap().kind, ColumnKind::Text);
        assert_eq!(catalog.column("field_50").unwrap().kind, ColumnKind::Text);
        assert!(catalog.column("field_51").is_none());
        assert_eq!(catalog.column("int_20").unwrap().kind, ColumnKind::Integer);
        assert_eq!(catalog.column("float_10").unwrap().kind, ColumnKind::Decimal);
        assert_eq!(
            catalog.column("datetime_10").unwrap().kind,
            ColumnKind::DateTime
        );
        assert_eq!(catalog.column("date_10").unwrap().kind, ColumnKind::Date);
        assert_eq!(catalog.column("text_01").unwrap().kind, ColumnKind::LongText);
    }

    #[test]
    fn test_gps_sn_only_on_locatable_tables() {
        assert!(TargetModel::Org.column("gps_sn").is_some());
        assert!(TargetModel::Customer.column("gps_sn").is_some());
        assert!(TargetModel::Goods.column("gps_sn").is_some());
        assert!(TargetModel::FormData.column("gps_sn").is_none());
        assert!(TargetModel::Services.column("gps_sn").is_none());
    }

    #[test]
    fn test_form_data_user_refs() {
        assert!(TargetModel::FormData.column("user_id").is_some());
        assert!(TargetModel::Org.column("user_id").is_none());
        assert!(TargetModel::Org.column("name").is_some());
    }
}
