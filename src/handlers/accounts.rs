//! # Account Handlers
//!
//! Accounts and ledger statements. Statement posting adjusts the owning
//! balance slot atomically in the repository.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::pagination::{page_params, paginate};
use crate::repositories::AccountRepository;
use crate::repositories::account::{CreateAccountRequest, PostStatementRequest};
use crate::server::AppState;

fn repo<'a>(state: &'a AppState) -> AccountRepository<'a> {
    AccountRepository::new(&state.db, &state.idgen)
}

/// Request payload for creating an account
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAccountDto {
    #[serde(default = "default_one")]
    pub sys_id: i32,
    #[serde(default = "default_one")]
    pub org_id: i32,
    #[serde(default = "default_one")]
    pub biz_id: i32,
    #[serde(default = "default_one")]
    pub src_id: i32,
    pub user_id: Option<String>,
    pub obj_id: Option<String>,
    pub acc_1_name: Option<String>,
    pub acc_1_type: Option<String>,
    pub acc_2_name: Option<String>,
    pub acc_2_type: Option<String>,
    pub acc_3_name: Option<String>,
    pub acc_3_type: Option<String>,
    pub points_name: Option<String>,
}

fn default_one() -> i32 {
    1
}

/// Request payload for posting a ledger statement
#[derive(Debug, Deserialize, ToSchema)]
pub struct PostStatementDto {
    pub account_id: String,
    /// acc_1, acc_2, acc_3 or points
    pub acc_name: String,
    /// income, expense, lock, payment
    pub record_type: String,
    pub amount: Decimal,
    pub order_num: Option<String>,
    pub remark: Option<String>,
}

pub async fn list_accounts(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<JsonValue>, ApiError> {
    let paging = page_params(&params);
    let parse_i32 = |key: &str| params.get(key).and_then(|v| v.parse::<i32>().ok());

    let (count, items) = repo(&state)
        .list_accounts(
            parse_i32("sys_id"),
            parse_i32("org_id"),
            params.get("obj_id").map(String::as_str),
            paging.page,
            paging.page_size,
        )
        .await?;

    let envelope = paginate("/api/v1/accounts", &params, paging, count, items);
    Ok(Json(serde_json::to_value(envelope).unwrap_or(JsonValue::Null)))
}

pub async fn create_account(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(dto): Json<CreateAccountDto>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    let account = repo(&state)
        .create_account(CreateAccountRequest {
            sys_id: dto.sys_id,
            org_id: dto.org_id,
            biz_id: dto.biz_id,
            src_id: dto.src_id,
            user_id: dto.user_id,
            obj_id: dto.obj_id,
            acc_1_name: dto.acc_1_name,
            acc_1_type: dto.acc_1_type,
            acc_2_name: dto.acc_2_name,
            acc_2_type: dto.acc_2_type,
            acc_3_name: dto.acc_3_name,
            acc_3_type: dto.acc_3_type,
            points_name: dto.points_name,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(account).unwrap_or(JsonValue::Null)),
    ))
}

pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    let account = repo(&state)
        .get_account(&id)
        .await?
        .ok_or_else(|| crate::error::not_found(&format!("Account not found: {id}")))?;
    Ok(Json(serde_json::to_value(account).unwrap_or(JsonValue::Null)))
}

pub async fn delete_account(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    repo(&state).delete_account(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Statements of one account, newest first.
pub async fn list_statements(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<JsonValue>, ApiError> {
    let paging = page_params(&params);
    let (count, items) = repo(&state)
        .list_statements(&id, paging.page, paging.page_size)
        .await?;

    let path = format!("/api/v1/accounts/{id}/statements");
    let envelope = paginate(&path, &params, paging, count, items);
    Ok(Json(serde_json::to_value(envelope).unwrap_or(JsonValue::Null)))
}

/// Post a ledger statement; the matching balance slot moves with it.
#[utoipa::path(
    post,
    path = "/api/v1/accountstatements",
    security(("bearer_auth" = [])),
    request_body = PostStatementDto,
    responses(
        (status = 201, description = "Statement posted and balance adjusted"),
        (status = 400, description = "Unknown slot/type or insufficient balance", body = ApiError),
        (status = 404, description = "Account not found", body = ApiError)
    ),
    tag = "accounts"
)]
pub async fn post_statement(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(dto): Json<PostStatementDto>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    let statement = repo(&state)
        .post_statement(PostStatementRequest {
            account_id: dto.account_id,
            acc_name: dto.acc_name,
            record_type: dto.record_type,
            amount: dto.amount,
            order_num: dto.order_num,
            remark: dto.remark,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(statement).unwrap_or(JsonValue::Null)),
    ))
}
