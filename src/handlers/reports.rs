//! # Report Handlers
//!
//! Report configuration CRUD and execution. Execution compiles the stored
//! definition against the template plan's alias allowlist; every value
//! reaches the database as a bound parameter.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use utoipa::ToSchema;

use crate::auth::CurrentUser;
use crate::error::{ApiError, parse_error};
use crate::pagination::{page_params, paginate};
use crate::repositories::report::{CreateReportRequest, ReportArguments};
use crate::repositories::{ReportRepository, TemplateRepository};
use crate::server::AppState;

fn repo<'a>(state: &'a AppState) -> ReportRepository<'a> {
    ReportRepository::new(&state.db, &state.idgen)
}

/// Request payload for creating a report configuration
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReportDto {
    #[serde(default = "default_one")]
    pub sys_id: i32,
    #[serde(default = "default_one")]
    pub org_id: i32,
    #[serde(default = "default_one")]
    pub biz_id: i32,
    #[serde(default = "default_one")]
    pub src_id: i32,
    pub report_id: i32,
    pub report_name: Option<String>,
    pub report_remark: Option<String>,
    pub template_id: Option<String>,
    /// Filters/group_by/aggregates/order_by definition (JSON text)
    pub arguments: Option<String>,
    pub data_struct: Option<String>,
    pub charts_struct: Option<String>,
}

fn default_one() -> i32 {
    1
}

pub async fn list_reports(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<JsonValue>, ApiError> {
    let paging = page_params(&params);
    let sys_id = params.get("sys_id").and_then(|v| v.parse::<i32>().ok());

    let (count, items) = repo(&state)
        .list_reports(sys_id, paging.page, paging.page_size)
        .await?;

    let envelope = paginate("/api/v1/reports", &params, paging, count, items);
    Ok(Json(serde_json::to_value(envelope).unwrap_or(JsonValue::Null)))
}

pub async fn create_report(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(dto): Json<CreateReportDto>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    let report = repo(&state)
        .create_report(CreateReportRequest {
            sys_id: dto.sys_id,
            org_id: dto.org_id,
            biz_id: dto.biz_id,
            src_id: dto.src_id,
            report_id: dto.report_id,
            report_name: dto.report_name,
            report_remark: dto.report_remark,
            template_id: dto.template_id,
            arguments: dto.arguments,
            data_struct: dto.data_struct,
            charts_struct: dto.charts_struct,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(report).unwrap_or(JsonValue::Null)),
    ))
}

pub async fn delete_report(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    repo(&state).delete_report(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn execute(
    state: &AppState,
    report_id: i32,
    params: BTreeMap<String, String>,
) -> Result<JsonValue, ApiError> {
    let reports = repo(state);
    let report = reports
        .get_by_report_id(report_id)
        .await?
        .ok_or_else(|| crate::error::not_found(&format!("Report not found: {report_id}")))?;

    let template_id = report
        .template_id
        .as_deref()
        .ok_or_else(|| parse_error("report has no template"))?;
    let templates = TemplateRepository::new(&state.db, &state.plans, &state.idgen);
    let plan = templates.get_plan(template_id).await?;

    let arguments: ReportArguments = report
        .arguments
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| parse_error(&format!("invalid report arguments: {e}")))?
        .unwrap_or_default();

    let data = reports.run(&plan, &arguments, &params).await?;

    let header = report
        .data_struct
        .as_deref()
        .and_then(|s| serde_json::from_str::<JsonValue>(s).ok())
        .and_then(|v| v.get("header").cloned())
        .unwrap_or(JsonValue::Null);
    let charts = report
        .charts_struct
        .as_deref()
        .and_then(|s| serde_json::from_str::<JsonValue>(s).ok())
        .unwrap_or(JsonValue::Null);

    Ok(json!({
        "id": report_id,
        "title": report.report_name,
        "data": data,
        "header": header,
        "charts": charts,
    }))
}

/// Run a report with parameters from the query string.
#[utoipa::path(
    get,
    path = "/api/v1/reports/{report_id}/run",
    params(("report_id" = i32, Path, description = "Public report handle")),
    responses(
        (status = 200, description = "Report result: {id, title, data, header, charts}"),
        (status = 400, description = "Missing required parameter", body = ApiError),
        (status = 404, description = "Report not found", body = ApiError)
    ),
    tag = "reports"
)]
pub async fn run_report(
    State(state): State<AppState>,
    Path(report_id): Path<i32>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<JsonValue>, ApiError> {
    Ok(Json(execute(&state, report_id, params).await?))
}

/// Run a report with parameters in the POST body.
pub async fn run_report_post(
    State(state): State<AppState>,
    Path(report_id): Path<i32>,
    Json(body): Json<JsonValue>,
) -> Result<Json<JsonValue>, ApiError> {
    let mut params = BTreeMap::new();
    if let Some(object) = body.as_object() {
        for (key, value) in object {
            let rendered = match value {
                JsonValue::String(s) => s.clone(),
                JsonValue::Number(n) => n.to_string(),
                JsonValue::Bool(b) => b.to_string(),
                _ => continue,
            };
            params.insert(key.clone(), rendered);
        }
    }
    Ok(Json(execute(&state, report_id, params).await?))
}
