//! # Report Repository
//!
//! Report configurations and their execution. A report selects a template
//! and describes filters, group-by columns, aggregates and ordering as JSON;
//! execution resolves every name against the template plan's alias allowlist
//! and builds the query exclusively through bound parameters. Raw SQL never
//! enters a report definition.

use std::collections::BTreeMap;

use sea_orm::sea_query::{Alias, Expr, Func, Order, Query, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use serde_json::{Map as JsonMap, Value as JsonValue, json};

use crate::engine::catalog::ColumnKind;
use crate::engine::filter::build_condition;
use crate::engine::plan::{AggrKind, TemplatePlan};
use crate::engine::value::decode_column;
use crate::error::RepositoryError;
use crate::idgen::IdGenerator;
use crate::models::report_conf::{
    ActiveModel as ReportActiveModel, Entity as ReportConf, Model as ReportModel,
};
use crate::models::report_conf;

/// One declared report parameter; its name doubles as the filter parameter
/// passed to the plan's filterset.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportFilter {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<String>,
}

/// One aggregate output column.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportAggregate {
    pub name: String,
    /// Template field alias the aggregate runs over
    pub field: String,
    /// count, sum, avg, min, max
    pub aggr: String,
}

fn default_limit() -> u64 {
    1000
}

/// Parsed `arguments` JSON of a report configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportArguments {
    #[serde(default)]
    pub filters: Vec<ReportFilter>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub aggregates: Vec<ReportAggregate>,
    /// Aliases or aggregate names; `-` prefix for descending
    #[serde(default)]
    pub order_by: Vec<String>,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

impl Default for ReportArguments {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            group_by: Vec::new(),
            aggregates: Vec::new(),
            order_by: Vec::new(),
            limit: default_limit(),
        }
    }
}

/// Request data for creating a report configuration.
#[derive(Debug, Clone)]
pub struct CreateReportRequest {
    pub sys_id: i32,
    pub org_id: i32,
    pub biz_id: i32,
    pub src_id: i32,
    pub report_id: i32,
    pub report_name: Option<String>,
    pub report_remark: Option<String>,
    pub template_id: Option<String>,
    pub arguments: Option<String>,
    pub data_struct: Option<String>,
    pub charts_struct: Option<String>,
}

/// Repository for report configurations.
pub struct ReportRepository<'a> {
    db: &'a DatabaseConnection,
    idgen: &'a IdGenerator,
}

impl<'a> ReportRepository<'a> {
    pub fn new(db: &'a DatabaseConnection, idgen: &'a IdGenerator) -> Self {
        Self { db, idgen }
    }

    pub async fn create_report(
        &self,
        request: CreateReportRequest,
    ) -> Result<ReportModel, RepositoryError> {
        if let Some(arguments) = request.arguments.as_deref() {
            serde_json::from_str::<ReportArguments>(arguments).map_err(|e| {
                RepositoryError::validation_error(format!("invalid arguments JSON: {e}"))
            })?;
        }

        let report = ReportActiveModel {
            id: Set(self.idgen.next_id("R")),
            sys_id: Set(request.sys_id),
            org_id: Set(request.org_id),
            biz_id: Set(request.biz_id),
            src_id: Set(request.src_id),
            report_id: Set(request.report_id),
            report_name: Set(request.report_name),
            report_remark: Set(request.report_remark),
            template_id: Set(request.template_id),
            arguments: Set(request.arguments),
            data_struct: Set(request.data_struct),
            charts_struct: Set(request.charts_struct),
        };

        Ok(report.insert(self.db).await?)
    }

    pub async fn get_by_report_id(
        &self,
        report_id: i32,
    ) -> Result<Option<ReportModel>, RepositoryError> {
        Ok(ReportConf::find()
            .filter(report_conf::Column::ReportId.eq(report_id))
            .one(self.db)
            .await?)
    }

    pub async fn list_reports(
        &self,
        sys_id: Option<i32>,
        page: u64,
        page_size: u64,
    ) -> Result<(u64, Vec<ReportModel>), RepositoryError> {
        let mut query = ReportConf::find()
            .order_by_asc(report_conf::Column::SysId)
            .order_by_asc(report_conf::Column::ReportId);
        if let Some(sys_id) = sys_id {
            query = query.filter(report_conf::Column::SysId.eq(sys_id));
        }

        let paginator = query.paginate(self.db, page_size.max(1));
        let count = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((count, items))
    }

    pub async fn delete_report(&self, id: &str) -> Result<(), RepositoryError> {
        let report = ReportConf::find_by_id(id)
            .one(self.db)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Report not found: {id}")))?;
        ReportConf::delete_by_id(report.id.as_str()).exec(self.db).await?;
        Ok(())
    }

    /// Execute a report against the template plan with caller parameters.
    ///
    /// Only declared filter names are read from `params`; group-by and
    /// order-by names must resolve within the plan's aliases (or the
    /// aggregate names), so no caller-supplied SQL fragment ever reaches the
    /// statement.
    pub async fn run(
        &self,
        plan: &TemplatePlan,
        arguments: &ReportArguments,
        params: &BTreeMap<String, String>,
    ) -> Result<Vec<JsonValue>, RepositoryError> {
        // Collect declared filter values only.
        let mut filter_params = BTreeMap::new();
        for filter in &arguments.filters {
            let value = params
                .get(&filter.name)
                .cloned()
                .filter(|v| !v.is_empty())
                .or_else(|| filter.default.clone());
            match value {
                Some(value) => {
                    filter_params.insert(filter.name.clone(), value);
                }
                None if filter.required => {
                    return Err(RepositoryError::validation_error(format!(
                        "{} is a required report parameter",
                        filter.name
                    )));
                }
                None => {}
            }
        }

        let condition = build_condition(plan, &filter_params)
            .map_err(|e| RepositoryError::validation_error(e.to_string()))?;

        let table = Alias::new(plan.target.table_name());
        let mut select = Query::select();
        select.from(table.clone()).cond_where(
            sea_orm::sea_query::Condition::all()
                .add(
                    Expr::col((table.clone(), Alias::new("template_id")))
                        .eq(plan.template_id.clone()),
                )
                .add(condition),
        );

        // Group-by columns resolve through the alias allowlist.
        let mut outputs: Vec<(String, ColumnKind)> = Vec::new();
        for name in &arguments.group_by {
            let field = plan.field_by_alias(name).ok_or_else(|| {
                RepositoryError::validation_error(format!(
                    "group_by field '{name}' is not a template field"
                ))
            })?;
            if field.is_related {
                return Err(RepositoryError::validation_error(format!(
                    "group_by field '{name}' is a related field"
                )));
            }
            let col = Expr::col((table.clone(), Alias::new(field.col_name.as_str())));
            select.expr_as(col.clone(), Alias::new(name.as_str()));
            select.add_group_by([SimpleExpr::from(col)]);
            outputs.push((name.clone(), field.kind));
        }

        let mut aggregate_names = Vec::new();
        for aggregate in &arguments.aggregates {
            let field = plan.field_by_alias(&aggregate.field).ok_or_else(|| {
                RepositoryError::validation_error(format!(
                    "aggregate field '{}' is not a template field",
                    aggregate.field
                ))
            })?;
            let aggr = AggrKind::from_str(&aggregate.aggr).ok_or_else(|| {
                RepositoryError::validation_error(format!(
                    "aggr not in [count, sum, avg, min, max]! \"{}\"",
                    aggregate.aggr
                ))
            })?;
            let col = Expr::col((table.clone(), Alias::new(field.col_name.as_str())));
            let expr: SimpleExpr = match aggr {
                AggrKind::Count => Func::count_distinct(col).into(),
                AggrKind::Sum => Func::sum(col).into(),
                AggrKind::Avg => Func::avg(col).into(),
                AggrKind::Min => Func::min(col).into(),
                AggrKind::Max => Func::max(col).into(),
            };
            select.expr_as(expr, Alias::new(aggregate.name.as_str()));
            aggregate_names.push(aggregate.name.clone());
        }

        // Order-by names must be projected outputs.
        for entry in &arguments.order_by {
            let (name, order) = match entry.strip_prefix('-') {
                Some(rest) => (rest, Order::Desc),
                None => (entry.as_str(), Order::Asc),
            };
            let known = outputs.iter().any(|(alias, _)| alias == name)
                || aggregate_names.iter().any(|n| n == name);
            if !known {
                return Err(RepositoryError::validation_error(format!(
                    "order_by field '{name}' is not part of the report output"
                )));
            }
            select.order_by(Alias::new(name), order);
        }

        select.limit(arguments.limit.clamp(1, 10_000));

        let backend = self.db.get_database_backend();
        let rows = self.db.query_all(backend.build(&select)).await?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let mut object = JsonMap::new();
            for (alias, kind) in &outputs {
                object.insert(alias.clone(), decode_column(&row, alias, *kind)?);
            }
            for name in &aggregate_names {
                object.insert(name.clone(), decode_report_aggregate(&row, name));
            }
            result.push(JsonValue::Object(object));
        }
        Ok(result)
    }
}

fn decode_report_aggregate(row: &sea_orm::QueryResult, alias: &str) -> JsonValue {
    if let Ok(Some(v)) = row.try_get::<Option<i64>>("", alias) {
        return json!(v);
    }
    if let Ok(Some(v)) = row.try_get::<Option<rust_decimal::Decimal>>("", alias) {
        return json!(v.to_string());
    }
    if let Ok(Some(v)) = row.try_get::<Option<f64>>("", alias) {
        return json!(v);
    }
    if let Ok(Some(v)) = row.try_get::<Option<String>>("", alias) {
        return json!(v);
    }
    JsonValue::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::plan::test_fixtures::{field, template};
    use crate::engine::query::DataQuery;
    use migration::MigratorTrait;
    use sea_orm::Database;
    use serde_json::json;

    async fn setup() -> (DatabaseConnection, IdGenerator) {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        (db, IdGenerator::new())
    }

    fn plan() -> TemplatePlan {
        let tmpl = template("FT1", "formdata", 1);
        let status = field("FF1", "FT1", "status", "field_01");
        let amount = field("FF2", "FT1", "amount", "int_01");
        TemplatePlan::build(&tmpl, &[status, amount], &[], None).unwrap()
    }

    async fn seed(db: &DatabaseConnection, plan: &TemplatePlan) {
        let query = DataQuery::new(db, plan);
        for (id, status, amount) in [
            ("D1", "open", 10),
            ("D2", "open", 20),
            ("D3", "closed", 5),
        ] {
            let payload = json!({"org_id": 1, "status": status, "amount": amount});
            let bound =
                crate::engine::binder::bind_payload(
                    plan,
                    payload.as_object().unwrap(),
                    crate::engine::binder::BindMode::Create,
                )
                    .unwrap();
            query.insert(id, &bound).await.unwrap();
        }
    }

    fn arguments() -> ReportArguments {
        serde_json::from_value(json!({
            "filters": [{"name": "status", "required": false}],
            "group_by": ["status"],
            "aggregates": [{"name": "total", "field": "amount", "aggr": "sum"}],
            "order_by": ["-total"]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_grouped_report() {
        let (db, idgen) = setup().await;
        let plan = plan();
        seed(&db, &plan).await;
        let repo = ReportRepository::new(&db, &idgen);

        let rows = repo
            .run(&plan, &arguments(), &BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["status"], json!("open"));
        assert_eq!(rows[0]["total"], json!(30));
        assert_eq!(rows[1]["status"], json!("closed"));
    }

    #[tokio::test]
    async fn test_declared_filter_applies() {
        let (db, idgen) = setup().await;
        let plan = plan();
        seed(&db, &plan).await;
        let repo = ReportRepository::new(&db, &idgen);

        let mut params = BTreeMap::new();
        params.insert("status".to_string(), "closed".to_string());
        let rows = repo.run(&plan, &arguments(), &params).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["total"], json!(5));
    }

    #[tokio::test]
    async fn test_undeclared_params_are_ignored() {
        let (db, idgen) = setup().await;
        let plan = plan();
        seed(&db, &plan).await;
        let repo = ReportRepository::new(&db, &idgen);

        // amount is a template field but not a declared report filter.
        let mut params = BTreeMap::new();
        params.insert("amount".to_string(), "10".to_string());
        let rows = repo.run(&plan, &arguments(), &params).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_order_by_outside_output_rejected() {
        let (db, idgen) = setup().await;
        let plan = plan();
        let repo = ReportRepository::new(&db, &idgen);

        let mut args = arguments();
        args.order_by = vec!["field_01; DROP TABLE form_data".to_string()];
        let result = repo.run(&plan, &args, &BTreeMap::new()).await;
        assert!(matches!(result, Err(RepositoryError::Validation(_))));
    }

    #[tokio::test]
    async fn test_required_filter_enforced() {
        let (db, idgen) = setup().await;
        let plan = plan();
        let repo = ReportRepository::new(&db, &idgen);

        let mut args = arguments();
        args.filters[0].required = true;
        let result = repo.run(&plan, &args, &BTreeMap::new()).await;
        assert!(matches!(result, Err(RepositoryError::Validation(_))));
    }
}
