//! # Generic Data Handlers
//!
//! The single CRUD surface every template-bound table is served through.
//! Every request carries `template_id` and `sys_id`; the supplied sys_id
//! must match the template's own before any data is touched. List queries
//! run the plan's filterset with optional last-point GPS enrichment and
//! path-keyed response caching; bulk mutations refuse to touch the full
//! unfiltered set when it holds more than one row.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::{Map as JsonMap, Value as JsonValue, json};

use crate::auth::MaybeUser;
use crate::engine::TemplatePlan;
use crate::engine::binder::{BindMode, BoundRow, bind_payload};
use crate::engine::filter::{build_condition, build_ordering};
use crate::engine::query::{DataQuery, clear_obj_refs};
use crate::error::{ApiError, RepositoryError, forbidden, parse_error, validation_error};
use crate::pagination::{page_params, paginate};
use crate::repositories::{GpsRepository, SystemLogRepository, TemplateRepository};
use crate::server::AppState;
use crate::tasks::Task;

/// Resolve the plan for a request's template_id; missing or unknown ids are
/// a parse error, matching the endpoint contract.
async fn resolve_plan(
    state: &AppState,
    template_id: Option<&str>,
) -> Result<Arc<TemplatePlan>, ApiError> {
    let template_id = template_id.filter(|v| !v.is_empty()).ok_or_else(|| {
        tracing::warn!("generic data request without template_id");
        parse_error("Bad template_id")
    })?;

    let repo = TemplateRepository::new(&state.db, &state.plans, &state.idgen);
    match repo.get_plan(template_id).await {
        Ok(plan) => Ok(plan),
        Err(RepositoryError::NotFound(_)) => Err(parse_error("Bad template_id")),
        Err(other) => Err(other.into()),
    }
}

/// Tenant-isolation check: the caller-supplied sys_id must equal the
/// template's own.
fn check_sys_id(plan: &TemplatePlan, supplied: Option<&JsonValue>) -> Result<(), ApiError> {
    let supplied = match supplied {
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    if supplied != plan.sys_id.to_string() {
        return Err(parse_error("sys_id error!"));
    }
    Ok(())
}

fn check_sys_id_str(plan: &TemplatePlan, supplied: Option<&String>) -> Result<(), ApiError> {
    check_sys_id(plan, supplied.map(|s| JsonValue::String(s.clone())).as_ref())
}

fn check_login(plan: &TemplatePlan, user: &MaybeUser) -> Result<(), ApiError> {
    if plan.need_login && user.0.is_none() {
        return Err(forbidden(None));
    }
    Ok(())
}

/// Rewrite src_id/org_id into the `src_id = org_id % 100` partition for
/// partitioned targets.
fn apply_partition(plan: &TemplatePlan, params: &mut BTreeMap<String, String>) {
    if !plan.target.is_partitioned() {
        return;
    }
    let src = params.get("src_id").and_then(|v| v.parse::<i64>().ok());
    let org = params.get("org_id").and_then(|v| v.parse::<i64>().ok());
    if let Some(src) = src {
        params.insert("src_id".to_string(), (src % 100).to_string());
    } else if let Some(org) = org {
        params.insert("src_id".to_string(), (org % 100).to_string());
    }
}

fn condition_for(
    plan: &TemplatePlan,
    params: &BTreeMap<String, String>,
) -> Result<sea_orm::sea_query::Condition, ApiError> {
    build_condition(plan, params)
        .map_err(|e| validation_error(&e.to_string(), JsonValue::Null))
}

/// Flatten a JSON object into filter parameters (the `querys` body shape).
fn params_from_object(object: &JsonMap<String, JsonValue>) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    for (key, value) in object {
        let rendered = match value {
            JsonValue::String(s) => s.clone(),
            JsonValue::Number(n) => n.to_string(),
            JsonValue::Bool(b) => b.to_string(),
            _ => continue,
        };
        params.insert(key.clone(), rendered);
    }
    params
}

fn user_name(user: &MaybeUser) -> String {
    user.0
        .as_ref()
        .map(|c| c.username.clone())
        .unwrap_or_else(|| "anonymous".to_string())
}

fn enrich_gps(state: &AppState, plan: &TemplatePlan, rows: Vec<JsonValue>) -> Vec<JsonValue> {
    let gps = GpsRepository::new(&state.db, &state.cache, &state.idgen);
    rows.into_iter()
        .map(|mut row| {
            let point = row
                .get("gps_sn")
                .and_then(|v| v.as_str())
                .map(|sn| gps.last_point(sn, plan.sys_id))
                .unwrap_or_else(crate::repositories::gps::empty_point);
            if let Some(object) = row.as_object_mut() {
                object.insert("gps_point".to_string(), point);
            }
            row
        })
        .collect()
}

async fn run_list(
    state: &AppState,
    user: &MaybeUser,
    path: &str,
    mut params: BTreeMap<String, String>,
) -> Result<JsonValue, ApiError> {
    let plan = resolve_plan(state, params.get("template_id").map(String::as_str)).await?;
    check_login(&plan, user)?;
    check_sys_id_str(&plan, params.get("sys_id"))?;

    let use_cache = params.get("use_cache").map(|v| v == "true").unwrap_or(false);
    let cache_key = format!(
        "{path}?{}",
        params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    );
    if use_cache {
        if let Some(cached) = state.cache.get(&cache_key) {
            metrics::counter!("formbase_data_cache_hits_total").increment(1);
            return Ok(cached);
        }
    }

    apply_partition(&plan, &mut params);
    let condition = condition_for(&plan, &params)?;
    let ordering = build_ordering(&plan, &params);
    let paging = page_params(&params);

    let query = DataQuery::new(&state.db, &plan);
    let count = query.count(condition.clone()).await?;
    let mut rows = query
        .list(condition, ordering, paging.page_size, paging.offset())
        .await?;

    let include_gps = params.get("include_gps").map(|v| v == "true").unwrap_or(false);
    if include_gps && plan.target.has_gps_sn() {
        rows = enrich_gps(state, &plan, rows);
    }

    let envelope = serde_json::to_value(paginate(path, &params, paging, count, rows))
        .unwrap_or(JsonValue::Null);

    if use_cache {
        state.cache.set(
            cache_key,
            envelope.clone(),
            Some(std::time::Duration::from_secs(
                state.config.response_cache_ttl_seconds,
            )),
        );
    }

    Ok(envelope)
}

/// List rows of a template-bound table.
#[utoipa::path(
    get,
    path = "/api/v1/data",
    params(
        ("template_id" = String, Query, description = "Template id"),
        ("sys_id" = i32, Query, description = "Tenant id; must match the template's")
    ),
    responses(
        (status = 200, description = "Paginated rows keyed by field alias"),
        (status = 400, description = "Bad template_id / sys_id error / bad filter", body = ApiError)
    ),
    tag = "data"
)]
pub async fn list_data(
    State(state): State<AppState>,
    user: MaybeUser,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<JsonValue>, ApiError> {
    metrics::counter!("formbase_data_requests_total", "op" => "list").increment(1);
    let value = run_list(&state, &user, uri.path(), params).await?;
    Ok(Json(value))
}

/// List rows with the query object in the POST body (filter values too long
/// or structured for a query string).
pub async fn find_data(
    State(state): State<AppState>,
    user: MaybeUser,
    OriginalUri(uri): OriginalUri,
    Json(body): Json<JsonValue>,
) -> Result<Json<JsonValue>, ApiError> {
    let object = body
        .as_object()
        .ok_or_else(|| parse_error("Data is empty!"))?;
    let value = run_list(&state, &user, uri.path(), params_from_object(object)).await?;
    Ok(Json(value))
}

/// Retrieve one row by id.
pub async fn get_data(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<JsonValue>, ApiError> {
    let plan = resolve_plan(&state, params.get("template_id").map(String::as_str)).await?;
    check_login(&plan, &user)?;
    check_sys_id_str(&plan, params.get("sys_id"))?;

    let row = DataQuery::new(&state.db, &plan)
        .get(&id)
        .await?
        .ok_or_else(|| crate::error::not_found(&format!("Record not found: {id}")))?;
    Ok(Json(row))
}

async fn create_one(
    state: &AppState,
    plan: &TemplatePlan,
    payload: &JsonMap<String, JsonValue>,
) -> Result<JsonValue, ApiError> {
    let bound = bind_payload(plan, payload, BindMode::Create)
        .map_err(|errors| validation_error("Validation failed", JsonValue::Object(errors.fields)))?;

    let query = DataQuery::new(&state.db, plan);
    verify_unique(&query, &bound, None).await?;

    let id = state.idgen.next_id(plan.target.id_prefix());
    query.insert(&id, &bound).await?;

    state.tasks.enqueue(Task::EtlPush {
        template_id: plan.template_id.clone(),
        record_id: id.clone(),
    });

    let row = query
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::from(crate::error::ErrorType::InternalServerError))?;
    Ok(row)
}

async fn verify_unique(
    query: &DataQuery<'_, sea_orm::DatabaseConnection>,
    bound: &BoundRow,
    exclude_id: Option<&str>,
) -> Result<(), ApiError> {
    // Uniqueness is scoped to (org_id, template_id, sys_id); without an
    // org_id in the payload there is nothing to scope against.
    let Some(org_id) = bound.org_id else {
        return Ok(());
    };
    for check in &bound.unique_checks {
        if query.unique_exists(check, org_id, exclude_id).await? {
            let display = check.value.display_for_verify().unwrap_or_default();
            return Err(validation_error(
                &format!("{}: {} already exists!", check.col_title, display),
                json!({ "field": check.col_name }),
            ));
        }
    }
    Ok(())
}

/// Create one row (object body) or several (homogeneous array body).
#[utoipa::path(
    post,
    path = "/api/v1/data",
    responses(
        (status = 201, description = "Created row(s), keyed by field alias"),
        (status = 400, description = "Bad template_id / sys_id error / validation failure", body = ApiError)
    ),
    tag = "data"
)]
pub async fn create_data(
    State(state): State<AppState>,
    user: MaybeUser,
    Json(body): Json<JsonValue>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    metrics::counter!("formbase_data_requests_total", "op" => "create").increment(1);

    let payloads: Vec<&JsonMap<String, JsonValue>> = match &body {
        JsonValue::Object(object) => vec![object],
        JsonValue::Array(items) => {
            if items.is_empty() {
                return Err(parse_error("Data is empty!"));
            }
            let objects: Option<Vec<_>> = items.iter().map(|i| i.as_object()).collect();
            objects.ok_or_else(|| parse_error("Data is empty!"))?
        }
        _ => return Err(parse_error("Data is empty!")),
    };

    let first = payloads[0];
    let template_id = first.get("template_id").and_then(|v| v.as_str());
    let plan = resolve_plan(&state, template_id).await?;
    check_login(&plan, &user)?;
    check_sys_id(&plan, first.get("sys_id"))?;

    // Array creates must stay within one template.
    for payload in &payloads {
        if payload.get("template_id").and_then(|v| v.as_str()) != Some(plan.template_id.as_str()) {
            return Err(parse_error("Bad template_id"));
        }
    }

    let mut created = Vec::with_capacity(payloads.len());
    for payload in payloads {
        created.push(create_one(&state, &plan, payload).await?);
    }

    let response = if body.is_array() {
        JsonValue::Array(created)
    } else {
        created.into_iter().next().unwrap_or(JsonValue::Null)
    };
    Ok((StatusCode::CREATED, Json(response)))
}

async fn apply_update(
    state: &AppState,
    user: &MaybeUser,
    id: &str,
    body: JsonValue,
    mode: BindMode,
) -> Result<Json<JsonValue>, ApiError> {
    let object = body
        .as_object()
        .ok_or_else(|| parse_error("Data is empty!"))?;
    let plan = resolve_plan(&state, object.get("template_id").and_then(|v| v.as_str())).await?;
    check_login(&plan, user)?;
    check_sys_id(&plan, object.get("sys_id"))?;

    let bound = bind_payload(&plan, object, mode)
        .map_err(|errors| validation_error("Validation failed", JsonValue::Object(errors.fields)))?;

    let query = DataQuery::new(&state.db, &plan);
    let before = query
        .get(id)
        .await?
        .ok_or_else(|| crate::error::not_found(&format!("Record not found: {id}")))?;

    verify_unique(&query, &bound, Some(id)).await?;
    query.update(id, &bound).await?;

    let logs = SystemLogRepository::new(&state.db, &state.idgen);
    if let Err(err) = logs
        .write(
            plan.sys_id,
            plan.org_id,
            "update",
            Some(&plan.template_id),
            Some(&user_name(user)),
            format!("UPDATE {}: {id}: {before}", plan.template_id),
        )
        .await
    {
        tracing::error!("failed to write update audit log: {err}");
    }

    state.tasks.enqueue(Task::EtlPush {
        template_id: plan.template_id.clone(),
        record_id: id.to_string(),
    });

    let row = query
        .get(id)
        .await?
        .ok_or_else(|| ApiError::from(crate::error::ErrorType::InternalServerError))?;
    Ok(Json(row))
}

/// Full update of one row.
pub async fn update_data(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<String>,
    Json(body): Json<JsonValue>,
) -> Result<Json<JsonValue>, ApiError> {
    metrics::counter!("formbase_data_requests_total", "op" => "update").increment(1);
    apply_update(&state, &user, &id, body, BindMode::Update).await
}

/// Partial update of one row.
pub async fn patch_data(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<String>,
    Json(body): Json<JsonValue>,
) -> Result<Json<JsonValue>, ApiError> {
    metrics::counter!("formbase_data_requests_total", "op" => "patch").increment(1);
    apply_update(&state, &user, &id, body, BindMode::Patch).await
}

/// Delete one row.
#[utoipa::path(
    delete,
    path = "/api/v1/data/{id}",
    params(
        ("id" = String, Path, description = "Row id"),
        ("template_id" = String, Query, description = "Template id"),
        ("sys_id" = i32, Query, description = "Tenant id; must match the template's")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Bad template_id / sys_id error", body = ApiError)
    ),
    tag = "data"
)]
pub async fn delete_data(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<StatusCode, ApiError> {
    metrics::counter!("formbase_data_requests_total", "op" => "delete").increment(1);

    let plan = resolve_plan(&state, params.get("template_id").map(String::as_str)).await?;
    check_login(&plan, &user)?;
    check_sys_id_str(&plan, params.get("sys_id"))?;

    let query = DataQuery::new(&state.db, &plan);
    let before = query
        .get(&id)
        .await?
        .ok_or_else(|| crate::error::not_found(&format!("Record not found: {id}")))?;

    query.delete_by_id(&id).await?;

    let logs = SystemLogRepository::new(&state.db, &state.idgen);
    if let Err(err) = logs
        .write(
            plan.sys_id,
            plan.org_id,
            "delete",
            Some(&plan.template_id),
            Some(&user_name(&user)),
            format!("DELETE: {before}"),
        )
        .await
    {
        tracing::error!("failed to write delete audit log: {err}");
    }

    state.tasks.enqueue(Task::RelatedCleanup {
        template_id: plan.template_id.clone(),
        record_id: id,
    });

    Ok(StatusCode::NO_CONTENT)
}

/// Shared shape of the bulk endpoints' request body.
fn bulk_parts(
    body: &JsonValue,
) -> Result<(&JsonMap<String, JsonValue>, Option<&str>, Option<&JsonValue>), ApiError> {
    let object = body
        .as_object()
        .ok_or_else(|| parse_error("Data is empty!"))?;
    let querys = object
        .get("querys")
        .and_then(|v| v.as_object())
        .ok_or_else(|| parse_error("querys is required"))?;
    let template_id = object.get("template_id").and_then(|v| v.as_str());
    Ok((querys, template_id, object.get("sys_id")))
}

/// The all-rows guard shared by the bulk endpoints: refuse to touch the
/// whole template when the filter matches everything and more than one row
/// exists.
async fn guard_bulk(
    query: &DataQuery<'_, sea_orm::DatabaseConnection>,
    condition: sea_orm::sea_query::Condition,
    action: &str,
) -> Result<(), ApiError> {
    let total = query.count(sea_orm::sea_query::Condition::all()).await?;
    let filtered = query.count(condition).await?;
    if total == filtered && total > 1 {
        return Err(parse_error(&format!("Not allowed to {action} all data")));
    }
    Ok(())
}

/// Bulk delete rows matching a freeform query object; returns the deleted
/// ids and clears dangling obj_id references.
pub async fn bulk_delete_data(
    State(state): State<AppState>,
    user: MaybeUser,
    Json(body): Json<JsonValue>,
) -> Result<Json<JsonValue>, ApiError> {
    metrics::counter!("formbase_data_requests_total", "op" => "bulk_delete").increment(1);

    let (querys, template_id, sys_id) = bulk_parts(&body)?;
    if sys_id.is_none() {
        return Err(parse_error("Bad sys_id"));
    }
    let plan = resolve_plan(&state, template_id).await?;
    check_login(&plan, &user)?;
    check_sys_id(&plan, sys_id)?;

    let params = params_from_object(querys);
    let condition = condition_for(&plan, &params)?;

    let query = DataQuery::new(&state.db, &plan);
    guard_bulk(&query, condition.clone(), "delete").await?;

    let ids = query.ids_matching(condition).await?;
    query.delete_ids(&ids).await?;

    if !ids.is_empty() {
        let logs = SystemLogRepository::new(&state.db, &state.idgen);
        if let Err(err) = logs
            .write(
                plan.sys_id,
                plan.org_id,
                "bulk_delete",
                Some(&plan.template_id),
                Some(&user_name(&user)),
                format!("DELETE: {}", JsonValue::Object(querys.clone())),
            )
            .await
        {
            tracing::error!("failed to write bulk delete audit log: {err}");
        }

        // Deleting through a related template leaves dangling pointers in
        // every table; sweep them synchronously like single deletes do via
        // the background task.
        clear_obj_refs(&state.db, &ids).await?;
    }

    Ok(Json(json!({ "deleted": ids })))
}

/// Bulk update rows matching a freeform query object with validated
/// update_fields; returns the updated row count.
pub async fn bulk_update_data(
    State(state): State<AppState>,
    user: MaybeUser,
    Json(body): Json<JsonValue>,
) -> Result<Json<JsonValue>, ApiError> {
    metrics::counter!("formbase_data_requests_total", "op" => "bulk_update").increment(1);

    let (querys, template_id, sys_id) = bulk_parts(&body)?;
    if sys_id.is_none() {
        return Err(parse_error("Bad sys_id"));
    }
    let plan = resolve_plan(&state, template_id).await?;
    check_login(&plan, &user)?;
    check_sys_id(&plan, sys_id)?;

    let mut update_fields = match body.get("update_fields").and_then(|v| v.as_object()) {
        Some(fields) if !fields.is_empty() => fields.clone(),
        _ => return Ok(Json(json!({ "updated": 0 }))),
    };
    // Tenant/partition identity never changes through bulk updates.
    for reserved in ["id", "pk", "org_id", "src_id", "sys_id", "template_id"] {
        update_fields.remove(reserved);
    }

    let bound = bind_payload(&plan, &update_fields, BindMode::Patch)
        .map_err(|errors| validation_error("Validation failed", JsonValue::Object(errors.fields)))?;

    let params = params_from_object(querys);
    let condition = condition_for(&plan, &params)?;

    let query = DataQuery::new(&state.db, &plan);
    guard_bulk(&query, condition.clone(), "update").await?;

    let ids = query.ids_matching(condition).await?;
    let updated = query.update_ids(&ids, &bound).await?;

    if updated > 0 {
        let logs = SystemLogRepository::new(&state.db, &state.idgen);
        if let Err(err) = logs
            .write(
                plan.sys_id,
                plan.org_id,
                "bulk_update",
                Some(&plan.template_id),
                Some(&user_name(&user)),
                format!("UPDATE: {}", JsonValue::Object(querys.clone())),
            )
            .await
        {
            tracing::error!("failed to write bulk update audit log: {err}");
        }
    }

    Ok(Json(json!({ "updated": updated })))
}

async fn run_aggregate(
    state: &AppState,
    user: &MaybeUser,
    params: BTreeMap<String, String>,
) -> Result<JsonValue, ApiError> {
    let plan = resolve_plan(state, params.get("template_id").map(String::as_str)).await?;
    check_login(&plan, user)?;
    check_sys_id_str(&plan, params.get("sys_id"))?;

    let condition = condition_for(&plan, &params)?;
    let result = DataQuery::new(&state.db, &plan).aggregate(condition).await?;
    Ok(result)
}

/// Configured aggregates over the filtered set (GET).
pub async fn aggregate_data(
    State(state): State<AppState>,
    user: MaybeUser,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<JsonValue>, ApiError> {
    metrics::counter!("formbase_data_requests_total", "op" => "aggregate").increment(1);
    Ok(Json(run_aggregate(&state, &user, params).await?))
}

/// Configured aggregates with parameters in the POST body.
pub async fn aggregate_data_post(
    State(state): State<AppState>,
    user: MaybeUser,
    Json(body): Json<JsonValue>,
) -> Result<Json<JsonValue>, ApiError> {
    let object = body
        .as_object()
        .ok_or_else(|| parse_error("Data is empty!"))?;
    Ok(Json(
        run_aggregate(&state, &user, params_from_object(object)).await?,
    ))
}

/// Request payload for linking two template-bound rows
#[derive(Debug, serde::Deserialize, utoipa::ToSchema)]
pub struct CreateM2mDto {
    pub from_id: String,
    pub to_id: String,
    /// The field descriptor the association belongs to
    pub from_field_id: Option<String>,
}

/// Link two rows through the generic association table.
pub async fn create_m2m(
    State(state): State<AppState>,
    Json(dto): Json<CreateM2mDto>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    use crate::models::form_m2m;
    use sea_orm::{ActiveModelTrait, Set};

    if dto.from_id.is_empty() || dto.to_id.is_empty() {
        return Err(parse_error("from_id and to_id are required"));
    }

    let link = form_m2m::ActiveModel {
        id: Set(state.idgen.next_id("MTM")),
        from_id: Set(dto.from_id),
        to_id: Set(dto.to_id),
        from_field_id: Set(dto.from_field_id),
    };
    let link = link.insert(&state.db).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(link).unwrap_or(JsonValue::Null)),
    ))
}

/// List associations touching a row, from either side.
pub async fn list_m2m(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<JsonValue>, ApiError> {
    use crate::models::form_m2m;
    use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

    let mut query = form_m2m::Entity::find();
    let mut scoped = false;
    if let Some(from_id) = params.get("from_id").filter(|v| !v.is_empty()) {
        query = query.filter(form_m2m::Column::FromId.eq(from_id.as_str()));
        scoped = true;
    }
    if let Some(to_id) = params.get("to_id").filter(|v| !v.is_empty()) {
        query = query.filter(form_m2m::Column::ToId.eq(to_id.as_str()));
        scoped = true;
    }
    if let Some(field_id) = params.get("from_field_id").filter(|v| !v.is_empty()) {
        query = query.filter(form_m2m::Column::FromFieldId.eq(field_id.as_str()));
        scoped = true;
    }
    if !scoped {
        return Err(parse_error("from_id or to_id is required"));
    }

    let links = query.all(&state.db).await?;
    Ok(Json(serde_json::to_value(links).unwrap_or(JsonValue::Null)))
}

/// Remove one association row.
pub async fn delete_m2m(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    use crate::models::form_m2m;
    use sea_orm::EntityTrait;

    let result = form_m2m::Entity::delete_by_id(id.as_str())
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(crate::error::not_found(&format!("Link not found: {id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}
