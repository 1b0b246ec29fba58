//! Dynamic query execution for template-bound tables.
//!
//! The logical schema is runtime data, so the data endpoints build their SQL
//! through sea-query instead of static entities: selects project each
//! resolved field `AS` its alias (related fields through a one-level LEFT
//! JOIN on obj_id), and every statement is scoped to the plan's template id.
//! Bulk mutations materialize the matching ids first so join-backed filters
//! never leak into UPDATE/DELETE statements.

use chrono::Utc;
use sea_orm::sea_query::{
    Alias, Asterisk, Condition, Expr, Func, Order, Query, SelectStatement, SimpleExpr,
};
use sea_orm::{ConnectionTrait, DbErr, QueryResult};
use serde_json::{Map as JsonMap, Value as JsonValue};

use super::REL_ALIAS;
use super::binder::{BoundRow, UniqueCheck};
use super::catalog::{ColumnKind, TargetModel};
use super::plan::{AggrKind, TemplatePlan};
use super::value::{ColumnValue, decode_column};

/// One aliased output column of a data select.
#[derive(Debug, Clone)]
pub struct OutputColumn {
    pub alias: String,
    pub kind: ColumnKind,
}

fn table(plan: &TemplatePlan) -> Alias {
    Alias::new(plan.target.table_name())
}

fn own(plan: &TemplatePlan, col: &str) -> Expr {
    Expr::col((table(plan), Alias::new(col)))
}

/// The projection for a plan: intrinsic columns plus every resolved field
/// aliased by its display name.
pub fn output_columns(plan: &TemplatePlan) -> Vec<OutputColumn> {
    let mut outputs = vec![
        OutputColumn { alias: "id".into(), kind: ColumnKind::Text },
        OutputColumn { alias: "sys_id".into(), kind: ColumnKind::Integer },
        OutputColumn { alias: "org_id".into(), kind: ColumnKind::Integer },
        OutputColumn { alias: "biz_id".into(), kind: ColumnKind::Integer },
        OutputColumn { alias: "src_id".into(), kind: ColumnKind::Integer },
        OutputColumn { alias: "template_id".into(), kind: ColumnKind::Text },
        OutputColumn { alias: "obj_id".into(), kind: ColumnKind::Text },
        OutputColumn { alias: "create_time".into(), kind: ColumnKind::DateTime },
    ];
    if plan.target.has_gps_sn() {
        outputs.push(OutputColumn { alias: "gps_sn".into(), kind: ColumnKind::Text });
    }
    for field in &plan.fields {
        // Intrinsics stay under their own name even when aliased by a field.
        if outputs.iter().any(|o| o.alias == field.alias) {
            continue;
        }
        outputs.push(OutputColumn {
            alias: field.alias.clone(),
            kind: field.kind,
        });
    }
    outputs
}

/// Executor for one plan against one connection.
pub struct DataQuery<'a, C: ConnectionTrait> {
    db: &'a C,
    plan: &'a TemplatePlan,
}

impl<'a, C: ConnectionTrait> DataQuery<'a, C> {
    pub fn new(db: &'a C, plan: &'a TemplatePlan) -> Self {
        Self { db, plan }
    }

    fn scope(&self) -> Condition {
        Condition::all().add(own(self.plan, "template_id").eq(self.plan.template_id.clone()))
    }

    fn base_select(&self, condition: Condition) -> SelectStatement {
        let plan = self.plan;
        let mut select = Query::select();
        select.from(table(plan));

        if plan.has_related_join() {
            if let Some(related) = &plan.related {
                select.join_as(
                    sea_orm::sea_query::JoinType::LeftJoin,
                    Alias::new(related.target.table_name()),
                    Alias::new(REL_ALIAS),
                    Expr::col((table(plan), Alias::new("obj_id")))
                        .equals((Alias::new(REL_ALIAS), Alias::new("id"))),
                );
            }
        }

        select.cond_where(self.scope().add(condition));
        select
    }

    fn projected_select(&self, condition: Condition) -> (SelectStatement, Vec<OutputColumn>) {
        let plan = self.plan;
        let mut select = self.base_select(condition);

        for output in [
            "id", "sys_id", "org_id", "biz_id", "src_id", "template_id", "obj_id", "create_time",
        ] {
            select.expr_as(own(plan, output), Alias::new(output));
        }
        if plan.target.has_gps_sn() {
            select.expr_as(own(plan, "gps_sn"), Alias::new("gps_sn"));
        }

        for field in &plan.fields {
            if [
                "id", "sys_id", "org_id", "biz_id", "src_id", "template_id", "obj_id",
                "create_time", "gps_sn",
            ]
            .contains(&field.alias.as_str())
            {
                continue;
            }
            let expr = if field.is_related {
                Expr::col((Alias::new(REL_ALIAS), Alias::new(field.col_name.as_str())))
            } else {
                own(plan, &field.col_name)
            };
            select.expr_as(expr, Alias::new(field.alias.as_str()));
        }

        (select, output_columns(plan))
    }

    async fn fetch_all(&self, select: &SelectStatement) -> Result<Vec<QueryResult>, DbErr> {
        let backend = self.db.get_database_backend();
        self.db.query_all(backend.build(select)).await
    }

    fn decode_row(row: &QueryResult, outputs: &[OutputColumn]) -> Result<JsonValue, DbErr> {
        let mut object = JsonMap::new();
        for output in outputs {
            object.insert(
                output.alias.clone(),
                decode_column(row, &output.alias, output.kind)?,
            );
        }
        Ok(JsonValue::Object(object))
    }

    /// Count rows matching the condition (template-scoped).
    pub async fn count(&self, condition: Condition) -> Result<u64, DbErr> {
        let mut select = self.base_select(condition);
        select.expr_as(Func::count(Expr::col(Asterisk)), Alias::new("ct"));

        let backend = self.db.get_database_backend();
        let row = self
            .db
            .query_one(backend.build(&select))
            .await?
            .ok_or_else(|| DbErr::Custom("count query returned no row".to_string()))?;
        Ok(row.try_get::<i64>("", "ct")? as u64)
    }

    /// List rows matching the condition, newest first unless ordered.
    pub async fn list(
        &self,
        condition: Condition,
        ordering: Vec<(SimpleExpr, Order)>,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<JsonValue>, DbErr> {
        let (mut select, outputs) = self.projected_select(condition);

        if ordering.is_empty() {
            select.order_by_expr(own(self.plan, "create_time").into(), Order::Desc);
        } else {
            for (expr, order) in ordering {
                select.order_by_expr(expr, order);
            }
        }
        select.limit(limit).offset(offset);

        let rows = self.fetch_all(&select).await?;
        rows.iter().map(|r| Self::decode_row(r, &outputs)).collect()
    }

    /// Fetch one row by primary key.
    pub async fn get(&self, id: &str) -> Result<Option<JsonValue>, DbErr> {
        let (mut select, outputs) =
            self.projected_select(Condition::all().add(own(self.plan, "id").eq(id)));
        select.limit(1);

        let backend = self.db.get_database_backend();
        match self.db.query_one(backend.build(&select)).await? {
            Some(row) => Ok(Some(Self::decode_row(&row, &outputs)?)),
            None => Ok(None),
        }
    }

    /// Insert a bound row under the given id, stamping tenant/template
    /// columns from the plan. org/customer/goods rows get `gps_sn = id` when
    /// the payload leaves it blank.
    pub async fn insert(&self, id: &str, bound: &BoundRow) -> Result<(), DbErr> {
        let plan = self.plan;
        let mut columns: Vec<(String, sea_orm::Value)> = vec![
            ("id".to_string(), id.into()),
            ("sys_id".to_string(), plan.sys_id.into()),
            ("template_id".to_string(), plan.template_id.clone().into()),
            ("create_time".to_string(), Utc::now().into()),
        ];

        for column in &bound.columns {
            columns.retain(|(name, _)| name != &column.col_name);
            columns.push((
                column.col_name.clone(),
                column.value.clone().into_value(column.kind),
            ));
        }

        let blank_gps = bound
            .column("gps_sn")
            .map(|c| match &c.value {
                ColumnValue::Text(s) => s.is_empty(),
                _ => c.value.is_null(),
            })
            .unwrap_or(true);
        if plan.target.has_gps_sn() && blank_gps {
            columns.retain(|(name, _)| name != "gps_sn");
            columns.push(("gps_sn".to_string(), id.into()));
        }

        let mut insert = Query::insert();
        insert
            .into_table(table(plan))
            .columns(columns.iter().map(|(name, _)| Alias::new(name.as_str())));
        insert
            .values(columns.into_iter().map(|(_, value)| value.into()))
            .map_err(|e| DbErr::Custom(e.to_string()))?;

        let backend = self.db.get_database_backend();
        self.db.execute(backend.build(&insert)).await?;
        Ok(())
    }

    /// Update one row by primary key; returns affected row count.
    pub async fn update(&self, id: &str, bound: &BoundRow) -> Result<u64, DbErr> {
        if bound.columns.is_empty() {
            return Ok(0);
        }

        let mut update = Query::update();
        update.table(table(self.plan));
        for column in &bound.columns {
            update.value(
                Alias::new(column.col_name.as_str()),
                column.value.clone().into_value(column.kind),
            );
        }
        update
            .and_where(Expr::col(Alias::new("id")).eq(id))
            .and_where(Expr::col(Alias::new("template_id")).eq(self.plan.template_id.clone()));

        let backend = self.db.get_database_backend();
        let result = self.db.execute(backend.build(&update)).await?;
        Ok(result.rows_affected())
    }

    /// Delete one row by primary key; returns affected row count.
    pub async fn delete_by_id(&self, id: &str) -> Result<u64, DbErr> {
        let mut delete = Query::delete();
        delete
            .from_table(table(self.plan))
            .and_where(Expr::col(Alias::new("id")).eq(id))
            .and_where(Expr::col(Alias::new("template_id")).eq(self.plan.template_id.clone()));

        let backend = self.db.get_database_backend();
        let result = self.db.execute(backend.build(&delete)).await?;
        Ok(result.rows_affected())
    }

    /// Collect the ids matching a condition (used by bulk mutations).
    pub async fn ids_matching(&self, condition: Condition) -> Result<Vec<String>, DbErr> {
        let mut select = self.base_select(condition);
        select.expr_as(own(self.plan, "id"), Alias::new("id"));

        let rows = self.fetch_all(&select).await?;
        rows.iter()
            .map(|row| row.try_get::<String>("", "id"))
            .collect()
    }

    /// Delete the given ids; returns affected row count.
    pub async fn delete_ids(&self, ids: &[String]) -> Result<u64, DbErr> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut delete = Query::delete();
        delete
            .from_table(table(self.plan))
            .and_where(Expr::col(Alias::new("id")).is_in(ids.iter().cloned()));

        let backend = self.db.get_database_backend();
        let result = self.db.execute(backend.build(&delete)).await?;
        Ok(result.rows_affected())
    }

    /// Apply an update to the given ids; returns affected row count.
    pub async fn update_ids(&self, ids: &[String], bound: &BoundRow) -> Result<u64, DbErr> {
        if ids.is_empty() || bound.columns.is_empty() {
            return Ok(0);
        }
        let mut update = Query::update();
        update.table(table(self.plan));
        for column in &bound.columns {
            update.value(
                Alias::new(column.col_name.as_str()),
                column.value.clone().into_value(column.kind),
            );
        }
        update.and_where(Expr::col(Alias::new("id")).is_in(ids.iter().cloned()));

        let backend = self.db.get_database_backend();
        let result = self.db.execute(backend.build(&update)).await?;
        Ok(result.rows_affected())
    }

    /// Run the template's configured aggregates over the filtered set.
    pub async fn aggregate(&self, condition: Condition) -> Result<JsonValue, DbErr> {
        if self.plan.aggregates.is_empty() {
            return Ok(JsonValue::Object(JsonMap::new()));
        }

        let mut select = self.base_select(condition);
        for spec in &self.plan.aggregates {
            let col = own(self.plan, &spec.col_name);
            let expr: SimpleExpr = match spec.aggr {
                AggrKind::Count => Func::count_distinct(col).into(),
                AggrKind::Sum => Func::sum(col).into(),
                AggrKind::Avg => Func::avg(col).into(),
                AggrKind::Min => Func::min(col).into(),
                AggrKind::Max => Func::max(col).into(),
            };
            select.expr_as(expr, Alias::new(spec.name.as_str()));
        }

        let backend = self.db.get_database_backend();
        let row = self
            .db
            .query_one(backend.build(&select))
            .await?
            .ok_or_else(|| DbErr::Custom("aggregate query returned no row".to_string()))?;

        let mut object = JsonMap::new();
        for spec in &self.plan.aggregates {
            object.insert(spec.name.clone(), decode_aggregate(&row, &spec.name));
        }
        Ok(JsonValue::Object(object))
    }

    /// Whether a declared-unique value already exists within
    /// `(org_id, template_id, sys_id)`, optionally excluding one row.
    pub async fn unique_exists(
        &self,
        check: &UniqueCheck,
        org_id: i64,
        exclude_id: Option<&str>,
    ) -> Result<bool, DbErr> {
        let mut condition = Condition::all()
            .add(own(self.plan, &check.col_name).eq(check.value.clone().into_value(check.kind)))
            .add(own(self.plan, "org_id").eq(org_id))
            .add(own(self.plan, "sys_id").eq(self.plan.sys_id));
        if let Some(id) = exclude_id {
            condition = condition.add(own(self.plan, "id").ne(id));
        }

        Ok(self.count(condition).await? > 0)
    }
}

/// Aggregate outputs are backend-shaped (SUM of bigint is numeric on
/// Postgres, integer on SQLite), so decode permissively.
fn decode_aggregate(row: &QueryResult, alias: &str) -> JsonValue {
    if let Ok(Some(v)) = row.try_get::<Option<i64>>("", alias) {
        return JsonValue::Number(v.into());
    }
    if let Ok(Some(v)) = row.try_get::<Option<rust_decimal::Decimal>>("", alias) {
        return JsonValue::String(v.to_string());
    }
    if let Ok(Some(v)) = row.try_get::<Option<f64>>("", alias) {
        return serde_json::Number::from_f64(v)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(Some(v)) = row.try_get::<Option<String>>("", alias) {
        return JsonValue::String(v);
    }
    JsonValue::Null
}

/// Null out `obj_id` references to the given rows across every
/// template-bindable table. Runs after deletes so related templates do not
/// keep dangling pointers.
pub async fn clear_obj_refs<C: ConnectionTrait>(db: &C, ids: &[String]) -> Result<u64, DbErr> {
    if ids.is_empty() {
        return Ok(0);
    }

    let backend = db.get_database_backend();
    let mut cleared = 0;
    for target in TargetModel::ALL {
        let mut update = Query::update();
        update
            .table(Alias::new(target.table_name()))
            .value(Alias::new("obj_id"), sea_orm::Value::String(None))
            .and_where(Expr::col(Alias::new("obj_id")).is_in(ids.iter().cloned()));
        cleared += db.execute(backend.build(&update)).await?.rows_affected();
    }
    Ok(cleared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::binder::{BindMode, bind_payload};
    use crate::engine::filter::build_condition;
    use crate::engine::plan::TemplatePlan;
    use crate::engine::plan::test_fixtures::{field, template};
    use migration::MigratorTrait;
    use sea_orm::{Database, DatabaseConnection};
    use serde_json::json;
    use std::collections::BTreeMap;

    async fn setup_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    fn plan() -> TemplatePlan {
        let tmpl = template("FT1", "formdata", 1);
        let mut name = field("FF1", "FT1", "name", "field_01");
        name.is_required = true;
        let age = field("FF2", "FT1", "age", "int_01");
        TemplatePlan::build(&tmpl, &[name, age], &[], None).unwrap()
    }

    fn bound(plan: &TemplatePlan, payload: serde_json::Value) -> BoundRow {
        bind_payload(plan, payload.as_object().unwrap(), BindMode::Create).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_alias_round_trip() {
        let db = setup_db().await;
        let plan = plan();
        let query = DataQuery::new(&db, &plan);

        query
            .insert("D1", &bound(&plan, json!({"org_id": 7, "name": "abc", "age": 5})))
            .await
            .unwrap();

        let row = query.get("D1").await.unwrap().unwrap();
        assert_eq!(row["name"], json!("abc"));
        assert_eq!(row["age"], json!(5));
        assert_eq!(row["template_id"], json!("FT1"));
        assert_eq!(row["sys_id"], json!(1));
        // Aliases, not physical column names, appear in output.
        assert!(row.get("field_01").is_none());
    }

    #[tokio::test]
    async fn test_list_with_filters() {
        let db = setup_db().await;
        let plan = plan();
        let query = DataQuery::new(&db, &plan);

        for (id, name, age) in [("D1", "abc", 5), ("D2", "def", 9), ("D3", "ghi", 5)] {
            query
                .insert(id, &bound(&plan, json!({"org_id": 1, "name": name, "age": age})))
                .await
                .unwrap();
        }

        let mut params = BTreeMap::new();
        params.insert("age".to_string(), "5".to_string());
        let condition = build_condition(&plan, &params).unwrap();

        let rows = query.list(condition.clone(), Vec::new(), 50, 0).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(query.count(condition).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = setup_db().await;
        let plan = plan();
        let query = DataQuery::new(&db, &plan);

        query
            .insert("D1", &bound(&plan, json!({"org_id": 1, "name": "abc"})))
            .await
            .unwrap();

        let patch = bind_payload(&plan, json!({"age": 42}).as_object().unwrap(), BindMode::Patch).unwrap();
        assert_eq!(query.update("D1", &patch).await.unwrap(), 1);

        let row = query.get("D1").await.unwrap().unwrap();
        assert_eq!(row["age"], json!(42));

        assert_eq!(query.delete_by_id("D1").await.unwrap(), 1);
        assert!(query.get("D1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rows_scoped_to_template() {
        let db = setup_db().await;
        let plan_a = plan();
        let tmpl_b = template("FT2", "formdata", 1);
        let plan_b =
            TemplatePlan::build(&tmpl_b, &[field("FF9", "FT2", "name", "field_01")], &[], None)
                .unwrap();

        let query_a = DataQuery::new(&db, &plan_a);
        let query_b = DataQuery::new(&db, &plan_b);

        query_a
            .insert("D1", &bound(&plan_a, json!({"org_id": 1, "name": "abc"})))
            .await
            .unwrap();

        assert_eq!(query_a.count(Condition::all()).await.unwrap(), 1);
        assert_eq!(query_b.count(Condition::all()).await.unwrap(), 0);
        assert!(query_b.get("D1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_exists_scoping() {
        let db = setup_db().await;
        let tmpl = template("FT1", "formdata", 1);
        let mut name = field("FF1", "FT1", "name", "field_01");
        name.unique_in_org = true;
        let plan = TemplatePlan::build(&tmpl, &[name], &[], None).unwrap();
        let query = DataQuery::new(&db, &plan);

        let row = bound(&plan, json!({"org_id": 7, "name": "abc"}));
        query.insert("D1", &row).await.unwrap();

        let check = &row.unique_checks[0];
        assert!(query.unique_exists(check, 7, None).await.unwrap());
        // Different org does not collide.
        assert!(!query.unique_exists(check, 8, None).await.unwrap());
        // The row itself is excluded on update.
        assert!(!query.unique_exists(check, 7, Some("D1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_aggregates() {
        let db = setup_db().await;
        let tmpl = template("FT1", "formdata", 1);
        let name = field("FF1", "FT1", "name", "field_01");
        let age = field("FF2", "FT1", "age", "int_01");
        let aggregates = vec![
            crate::models::form_aggregate_field::Model {
                id: "FA1".to_string(),
                sys_id: 1,
                org_id: 1,
                biz_id: 1,
                src_id: 0,
                template_id: "FT1".to_string(),
                field_id: "FF2".to_string(),
                aggr_type: Some("sum".to_string()),
                aggr_name: Some("age_total".to_string()),
                description: None,
            },
            crate::models::form_aggregate_field::Model {
                id: "FA2".to_string(),
                sys_id: 1,
                org_id: 1,
                biz_id: 1,
                src_id: 0,
                template_id: "FT1".to_string(),
                field_id: "FF1".to_string(),
                aggr_type: Some("count".to_string()),
                aggr_name: Some("names".to_string()),
                description: None,
            },
        ];
        let plan = TemplatePlan::build(&tmpl, &[name, age], &aggregates, None).unwrap();
        let query = DataQuery::new(&db, &plan);

        for (id, name, age) in [("D1", "abc", 5), ("D2", "abc", 9), ("D3", "def", 6)] {
            query
                .insert(id, &bound(&plan, json!({"org_id": 1, "name": name, "age": age})))
                .await
                .unwrap();
        }

        let result = query.aggregate(Condition::all()).await.unwrap();
        assert_eq!(result["age_total"], json!(20));
        assert_eq!(result["names"], json!(2));
    }

    #[tokio::test]
    async fn test_bulk_ids_and_clear_obj_refs() {
        let db = setup_db().await;
        let plan = plan();
        let query = DataQuery::new(&db, &plan);

        query
            .insert("D1", &bound(&plan, json!({"org_id": 1, "name": "abc"})))
            .await
            .unwrap();
        query
            .insert("D2", &bound(&plan, json!({"org_id": 1, "name": "def", "obj_id": "D1"})))
            .await
            .unwrap();

        // obj_id is not template-mapped, so it binds only through filters;
        // point D2 at D1 directly.
        let mut patch = BoundRow::default();
        patch.columns.push(crate::engine::binder::BoundColumn {
            col_name: "obj_id".to_string(),
            kind: ColumnKind::Text,
            value: crate::engine::value::ColumnValue::Text("D1".to_string()),
        });
        query.update("D2", &patch).await.unwrap();

        let ids = query.ids_matching(Condition::all()).await.unwrap();
        assert_eq!(ids.len(), 2);

        let cleared = clear_obj_refs(&db, &["D1".to_string()]).await.unwrap();
        assert_eq!(cleared, 1);
        let row = query.get("D2").await.unwrap().unwrap();
        assert_eq!(row["obj_id"], JsonValue::Null);
    }

    #[tokio::test]
    async fn test_related_join_projects_alias() {
        let db = setup_db().await;

        // Related template bound to orgs.
        let rel_tmpl = template("FT2", "org", 1);
        let rel_name = field("FF20", "FT2", "org_name", "name");
        let rel_plan = TemplatePlan::build(&rel_tmpl, &[rel_name], &[], None).unwrap();
        let rel_query = DataQuery::new(&db, &rel_plan);
        rel_query
            .insert("O1", &bound(&rel_plan, json!({"org_id": 1, "org_name": "Acme"})))
            .await
            .unwrap();

        // Main template with an obj_id pointer and a related display field.
        let tmpl = template("FT1", "formdata", 1);
        let mut obj = field("FF1", "FT1", "obj_id", "obj_id");
        obj.alias = String::new();
        obj.related_template_id = Some("FT2".to_string());
        let mut rel_field = field("FF2", "FT1", "company", "name");
        rel_field.is_related = true;
        let name = field("FF3", "FT1", "name", "field_01");
        let plan = TemplatePlan::build(
            &tmpl,
            &[obj, rel_field, name],
            &[],
            Some(("FT2".to_string(), TargetModel::Org)),
        )
        .unwrap();
        let query = DataQuery::new(&db, &plan);

        query
            .insert("D1", &bound(&plan, json!({"org_id": 1, "name": "abc", "obj_id": "O1"})))
            .await
            .unwrap();

        let row = query.get("D1").await.unwrap().unwrap();
        assert_eq!(row["company"], json!("Acme"));
        assert_eq!(row["obj_id"], json!("O1"));
    }
}
