//! # Template Admin Handlers
//!
//! CRUD for templates, field descriptors and aggregate definitions, plus
//! template copy. Reads are open; mutations require an authenticated caller.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use utoipa::ToSchema;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::pagination::{page_params, paginate};
use crate::repositories::TemplateRepository;
use crate::repositories::template::{CreateFieldRequest, CreateTemplateRequest};
use crate::server::AppState;

fn repo<'a>(state: &'a AppState) -> TemplateRepository<'a> {
    TemplateRepository::new(&state.db, &state.plans, &state.idgen)
}

/// Request payload for creating a template
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTemplateDto {
    #[serde(default = "default_one")]
    pub sys_id: i32,
    #[serde(default = "default_one")]
    pub org_id: i32,
    #[serde(default = "default_one")]
    pub biz_id: i32,
    #[serde(default = "default_one")]
    pub src_id: i32,
    #[serde(default = "default_api_name")]
    pub api_name: String,
    pub title: String,
    #[serde(default = "default_one")]
    pub form_type: i32,
    #[serde(default = "default_one")]
    pub sort_num: i32,
    pub category: Option<String>,
    pub keyword: Option<String>,
    pub remark: Option<String>,
    pub parent_id: Option<String>,
    #[serde(default)]
    pub need_login: bool,
}

fn default_one() -> i32 {
    1
}

fn default_api_name() -> String {
    "formdata".to_string()
}

/// Request payload for creating a field descriptor
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateFieldDto {
    pub template_id: String,
    pub col_title: String,
    #[serde(default)]
    pub alias: String,
    pub col_name: String,
    #[serde(default)]
    pub in_filter: bool,
    #[serde(default = "default_true")]
    pub is_required: bool,
    pub widget: Option<String>,
    pub widget_attr: Option<String>,
    pub verify_exp: Option<String>,
    pub related_template_id: Option<String>,
    pub local_data_source: Option<String>,
    #[serde(default = "default_one")]
    pub sort_num: i32,
    #[serde(default)]
    pub is_related: bool,
    pub desc: Option<String>,
    #[serde(default)]
    pub unique_in_org: bool,
}

fn default_true() -> bool {
    true
}

/// Request payload for copying a template into a target tenant
#[derive(Debug, Deserialize, ToSchema)]
pub struct CopyTemplateDto {
    /// Source template id
    pub form_id: String,
    /// Target sys_id
    pub target_id: i32,
    /// Title of the new template
    pub title: String,
}

/// List templates, filterable by tenant ids and a title/keyword search.
pub async fn list_templates(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<JsonValue>, ApiError> {
    let paging = page_params(&params);
    let parse_i32 = |key: &str| params.get(key).and_then(|v| v.parse::<i32>().ok());

    let (count, items) = repo(&state)
        .list_templates(
            parse_i32("sys_id"),
            parse_i32("org_id"),
            parse_i32("biz_id"),
            params.get("search").map(String::as_str),
            paging.page,
            paging.page_size,
        )
        .await?;

    let envelope = paginate("/api/v1/templates", &params, paging, count, items);
    Ok(Json(serde_json::to_value(envelope).unwrap_or(JsonValue::Null)))
}

/// Create a template.
#[utoipa::path(
    post,
    path = "/api/v1/templates",
    security(("bearer_auth" = [])),
    request_body = CreateTemplateDto,
    responses(
        (status = 201, description = "Template created"),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError)
    ),
    tag = "templates"
)]
pub async fn create_template(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(dto): Json<CreateTemplateDto>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    let template = repo(&state)
        .create_template(CreateTemplateRequest {
            sys_id: dto.sys_id,
            org_id: dto.org_id,
            biz_id: dto.biz_id,
            src_id: dto.src_id,
            api_name: dto.api_name,
            title: dto.title,
            form_type: dto.form_type,
            sort_num: dto.sort_num,
            category: dto.category,
            keyword: dto.keyword,
            remark: dto.remark,
            parent_id: dto.parent_id,
            need_login: dto.need_login,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(template).unwrap_or(JsonValue::Null)),
    ))
}

/// Retrieve a template with its ordered field descriptors.
pub async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    let repo = repo(&state);
    let template = repo.get_template_required(&id).await?;
    let fields = repo.list_fields(&id).await?;

    let mut value = serde_json::to_value(template).unwrap_or(JsonValue::Null);
    if let Some(object) = value.as_object_mut() {
        object.insert(
            "fields".to_string(),
            serde_json::to_value(fields).unwrap_or(JsonValue::Null),
        );
    }
    Ok(Json(value))
}

/// Patch a template; evicts its compiled plan.
pub async fn update_template(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<JsonValue>,
) -> Result<Json<JsonValue>, ApiError> {
    let patch = body
        .as_object()
        .ok_or_else(|| crate::error::parse_error("Data is empty!"))?;
    let template = repo(&state).update_template(&id, patch).await?;
    Ok(Json(serde_json::to_value(template).unwrap_or(JsonValue::Null)))
}

/// Delete a template. Data rows are left in place.
pub async fn delete_template(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    repo(&state).delete_template(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Copy a template (and its fields) into a target tenant.
#[utoipa::path(
    post,
    path = "/api/v1/templates/copy",
    security(("bearer_auth" = [])),
    request_body = CopyTemplateDto,
    responses(
        (status = 201, description = "New template id as {pk}"),
        (status = 404, description = "Source template not found", body = ApiError)
    ),
    tag = "templates"
)]
pub async fn copy_template(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(dto): Json<CopyTemplateDto>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    let copy = repo(&state)
        .copy_template(&dto.form_id, dto.target_id, &dto.title)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "pk": copy.id }))))
}

/// List field descriptors of a template.
pub async fn list_fields(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<JsonValue>, ApiError> {
    let template_id = params
        .get("template_id")
        .ok_or_else(|| crate::error::parse_error("Bad template_id"))?;
    let fields = repo(&state).list_fields(template_id).await?;
    Ok(Json(serde_json::to_value(fields).unwrap_or(JsonValue::Null)))
}

/// Create a field descriptor; tenant ids are stamped from the template.
pub async fn create_field(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(dto): Json<CreateFieldDto>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    let field = repo(&state)
        .create_field(CreateFieldRequest {
            template_id: dto.template_id,
            col_title: dto.col_title,
            alias: dto.alias,
            col_name: dto.col_name,
            in_filter: dto.in_filter,
            is_required: dto.is_required,
            widget: dto.widget,
            widget_attr: dto.widget_attr,
            verify_exp: dto.verify_exp,
            related_template_id: dto.related_template_id,
            local_data_source: dto.local_data_source,
            sort_num: dto.sort_num,
            is_related: dto.is_related,
            desc: dto.desc,
            unique_in_org: dto.unique_in_org,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(field).unwrap_or(JsonValue::Null)),
    ))
}

/// Patch a field descriptor; evicts the owning template's plan.
pub async fn update_field(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<JsonValue>,
) -> Result<Json<JsonValue>, ApiError> {
    let patch = body
        .as_object()
        .ok_or_else(|| crate::error::parse_error("Data is empty!"))?;
    let field = repo(&state).update_field(&id, patch).await?;
    Ok(Json(serde_json::to_value(field).unwrap_or(JsonValue::Null)))
}

/// Delete a field descriptor; evicts the owning template's plan.
pub async fn delete_field(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    repo(&state).delete_field(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Request payload for creating an aggregate definition
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAggregateDto {
    pub template_id: String,
    pub field_id: String,
    pub aggr_type: String,
    pub aggr_name: String,
    pub description: Option<String>,
}

/// List aggregate definitions of a template.
pub async fn list_aggregate_fields(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<JsonValue>, ApiError> {
    let template_id = params
        .get("template_id")
        .ok_or_else(|| crate::error::parse_error("Bad template_id"))?;
    let aggregates = repo(&state).list_aggregate_fields(template_id).await?;
    Ok(Json(serde_json::to_value(aggregates).unwrap_or(JsonValue::Null)))
}

/// Create an aggregate definition.
pub async fn create_aggregate_field(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(dto): Json<CreateAggregateDto>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    let aggregate = repo(&state)
        .create_aggregate_field(
            &dto.template_id,
            &dto.field_id,
            &dto.aggr_type,
            &dto.aggr_name,
            dto.description,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(aggregate).unwrap_or(JsonValue::Null)),
    ))
}

/// Delete an aggregate definition.
pub async fn delete_aggregate_field(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    repo(&state).delete_aggregate_field(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
