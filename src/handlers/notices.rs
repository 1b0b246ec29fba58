//! # Notice Handlers
//!
//! Notice CRUD plus send: delivery goes through the background queue and the
//! outcome lands on the record.

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
use crate::repositories::NoticeRepository;
use crate::repositories::notice::CreateNoticeRequest;
use crate::server::AppState;
use crate::tasks::Task;

fn repo<'a>(state: &'a AppState) -> NoticeRepository<'a> {
    NoticeRepository::new(&state.db, &state.idgen)
}

/// Request payload for creating a notice
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateNoticeDto {
    #[serde(default = "default_one")]
    pub sys_id: i32,
    #[serde(default = "default_one")]
    pub org_id: i32,
    #[serde(default = "default_one")]
    pub biz_id: i32,
    #[serde(default = "default_one")]
    pub src_id: i32,
    pub title: String,
    pub content: Option<String>,
    #[serde(default = "default_notice_type")]
    pub notice_type: String,
    pub target_user_id: Option<String>,
    pub target_phone: Option<String>,
    pub target_email: Option<String>,
}

fn default_one() -> i32 {
    1
}

fn default_notice_type() -> String {
    "system".to_string()
}

pub async fn list_notices(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<JsonValue>, ApiError> {
    let paging = page_params(&params);
    let parse_i32 = |key: &str| params.get(key).and_then(|v| v.parse::<i32>().ok());
    let is_read = params.get("is_read").and_then(|v| v.parse::<bool>().ok());

    let (count, items) = repo(&state)
        .list_notices(
            parse_i32("sys_id"),
            parse_i32("org_id"),
            params.get("target_user_id").map(String::as_str),
            is_read,
            paging.page,
            paging.page_size,
        )
        .await?;

    let envelope = paginate("/api/v1/notices", &params, paging, count, items);
    Ok(Json(serde_json::to_value(envelope).unwrap_or(JsonValue::Null)))
}

pub async fn create_notice(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(dto): Json<CreateNoticeDto>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    let notice = repo(&state)
        .create_notice(CreateNoticeRequest {
            sys_id: dto.sys_id,
            org_id: dto.org_id,
            biz_id: dto.biz_id,
            src_id: dto.src_id,
            title: dto.title,
            content: dto.content,
            notice_type: dto.notice_type,
            target_user_id: dto.target_user_id,
            target_phone: dto.target_phone,
            target_email: dto.target_email,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(notice).unwrap_or(JsonValue::Null)),
    ))
}

pub async fn get_notice(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    let notice = repo(&state)
        .get_notice(&id)
        .await?
        .ok_or_else(|| crate::error::not_found(&format!("Notice not found: {id}")))?;
    Ok(Json(serde_json::to_value(notice).unwrap_or(JsonValue::Null)))
}

pub async fn mark_notice_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    let notice = repo(&state).mark_read(&id).await?;
    Ok(Json(serde_json::to_value(notice).unwrap_or(JsonValue::Null)))
}

/// Queue the notice for SMS/email delivery.
pub async fn send_notice(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    // Existence check before queueing so callers get a 404 immediately.
    repo(&state)
        .get_notice(&id)
        .await?
        .ok_or_else(|| crate::error::not_found(&format!("Notice not found: {id}")))?;

    state.tasks.enqueue(Task::NoticeDelivery { notice_id: id });
    Ok(Json(json!({"detail": "queued"})))
}

pub async fn delete_notice(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    repo(&state).delete_notice(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
