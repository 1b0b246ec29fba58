//! # User & Login Handlers
//!
//! Password, SMS-code, email-code and QR-polling login flows, all issuing
//! JWT bearer tokens. One-time codes live in the TTL cache, are compared in
//! constant time and consumed on use. Code delivery goes through the notice
//! pipeline so failures surface on a record.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use rand::Rng;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use subtle::ConstantTimeEq;
use utoipa::ToSchema;

use crate::auth::{CurrentUser, issue_token};
use crate::error::{ApiError, parse_error, unauthorized};
use crate::repositories::notice::CreateNoticeRequest;
use crate::repositories::user::CreateUserRequest;
use crate::repositories::{NoticeRepository, UserRepository};
use crate::server::AppState;
use crate::tasks::Task;

fn users<'a>(state: &'a AppState) -> UserRepository<'a> {
    UserRepository::new(&state.db, &state.idgen, &state.config.jwt_secret)
}

fn code_ttl(state: &AppState) -> Duration {
    Duration::from_secs(state.config.login_code_ttl_seconds)
}

fn six_digit_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

fn login_response(state: &AppState, user: &crate::models::user::Model) -> Result<JsonValue, ApiError> {
    let token = issue_token(&state.config, user)?;
    Ok(json!({
        "token": token,
        "user": {
            "id": user.id,
            "sys_id": user.sys_id,
            "org_id": user.org_id,
            "username": user.username,
            "is_superuser": user.is_superuser,
        }
    }))
}

/// Request payload for password login
#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordLoginDto {
    #[serde(default = "default_sys")]
    pub sys_id: i32,
    pub username: String,
    pub password: String,
}

fn default_sys() -> i32 {
    1
}

/// Password login.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = PasswordLoginDto,
    responses(
        (status = 200, description = "Bearer token and user summary"),
        (status = 401, description = "Invalid credentials", body = ApiError)
    ),
    tag = "auth"
)]
pub async fn password_login(
    State(state): State<AppState>,
    Json(dto): Json<PasswordLoginDto>,
) -> Result<Json<JsonValue>, ApiError> {
    let repo = users(&state);
    let user = repo
        .find_by_username(dto.sys_id, &dto.username)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| unauthorized(Some("Invalid username or password")))?;

    if !repo.verify_password(&user, &dto.password) {
        return Err(unauthorized(Some("Invalid username or password")));
    }

    Ok(Json(login_response(&state, &user)?))
}

/// Request payload for sending a login code
#[derive(Debug, Deserialize, ToSchema)]
pub struct SendCodeDto {
    #[serde(default = "default_sys")]
    pub sys_id: i32,
    pub phone: Option<String>,
    pub email: Option<String>,
}

async fn send_code(
    state: &AppState,
    sys_id: i32,
    channel: &str,
    target: &str,
) -> Result<(), ApiError> {
    let key = format!("{channel}-code-{sys_id}-{target}");
    // One outstanding code per target; resending replaces it.
    let code = six_digit_code();
    state
        .cache
        .set(key, JsonValue::String(code.clone()), Some(code_ttl(state)));

    let notices = NoticeRepository::new(&state.db, &state.idgen);
    let notice = notices
        .create_notice(CreateNoticeRequest {
            sys_id,
            org_id: 1,
            biz_id: 1,
            src_id: 1,
            title: "Login code".to_string(),
            content: Some(code),
            notice_type: channel.to_string(),
            target_user_id: None,
            target_phone: (channel == "sms").then(|| target.to_string()),
            target_email: (channel == "email").then(|| target.to_string()),
        })
        .await?;

    state.tasks.enqueue(Task::NoticeDelivery {
        notice_id: notice.id,
    });
    Ok(())
}

/// Send a one-time SMS login code.
pub async fn send_sms_code(
    State(state): State<AppState>,
    Json(dto): Json<SendCodeDto>,
) -> Result<Json<JsonValue>, ApiError> {
    let phone = dto
        .phone
        .filter(|p| !p.is_empty())
        .ok_or_else(|| parse_error("phone is required"))?;
    send_code(&state, dto.sys_id, "sms", &phone).await?;
    Ok(Json(json!({"detail": "code sent"})))
}

/// Send a one-time email login code.
pub async fn send_email_code(
    State(state): State<AppState>,
    Json(dto): Json<SendCodeDto>,
) -> Result<Json<JsonValue>, ApiError> {
    let email = dto
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| parse_error("email is required"))?;
    send_code(&state, dto.sys_id, "email", &email).await?;
    Ok(Json(json!({"detail": "code sent"})))
}

/// Request payload for code login
#[derive(Debug, Deserialize, ToSchema)]
pub struct CodeLoginDto {
    #[serde(default = "default_sys")]
    pub sys_id: i32,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub code: String,
}

fn consume_code(state: &AppState, key: &str, supplied: &str) -> Result<(), ApiError> {
    // take() makes codes single-use even on mismatch.
    let stored = state
        .cache
        .take(key)
        .and_then(|v| v.as_str().map(str::to_string))
        .ok_or_else(|| unauthorized(Some("Code expired or not requested")))?;

    let matches: bool = ConstantTimeEq::ct_eq(stored.as_bytes(), supplied.as_bytes()).into();
    if !matches {
        return Err(unauthorized(Some("Invalid code")));
    }
    Ok(())
}

/// Exchange an SMS code for a bearer token.
pub async fn sms_login(
    State(state): State<AppState>,
    Json(dto): Json<CodeLoginDto>,
) -> Result<Json<JsonValue>, ApiError> {
    let phone = dto
        .phone
        .filter(|p| !p.is_empty())
        .ok_or_else(|| parse_error("phone is required"))?;
    consume_code(&state, &format!("sms-code-{}-{phone}", dto.sys_id), &dto.code)?;

    let user = users(&state)
        .find_by_phone(dto.sys_id, &phone)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| unauthorized(Some("No user for this phone")))?;

    Ok(Json(login_response(&state, &user)?))
}

/// Exchange an email code for a bearer token.
pub async fn email_login(
    State(state): State<AppState>,
    Json(dto): Json<CodeLoginDto>,
) -> Result<Json<JsonValue>, ApiError> {
    let email = dto
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| parse_error("email is required"))?;
    consume_code(&state, &format!("email-code-{}-{email}", dto.sys_id), &dto.code)?;

    let user = users(&state)
        .find_by_email(dto.sys_id, &email)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| unauthorized(Some("No user for this email")))?;

    Ok(Json(login_response(&state, &user)?))
}

fn qr_key(ticket: &str) -> String {
    format!("qr-login-{ticket}")
}

/// Create a QR login ticket for a client to render and poll.
pub async fn qr_new(State(state): State<AppState>) -> Result<Json<JsonValue>, ApiError> {
    let ticket = uuid::Uuid::new_v4().to_string();
    state.cache.set(
        qr_key(&ticket),
        json!({"status": "pending"}),
        Some(code_ttl(&state)),
    );
    Ok(Json(json!({"ticket": ticket})))
}

/// Poll a QR login ticket. Once confirmed, the token is handed out exactly
/// once and the ticket is consumed.
pub async fn qr_poll(
    State(state): State<AppState>,
    Query(params): Query<std::collections::BTreeMap<String, String>>,
) -> Result<Json<JsonValue>, ApiError> {
    let ticket = params
        .get("ticket")
        .ok_or_else(|| parse_error("ticket is required"))?;

    let Some(entry) = state.cache.get(&qr_key(ticket)) else {
        return Ok(Json(json!({"status": "expired"})));
    };

    if entry["status"] == "confirmed" {
        state.cache.remove(&qr_key(ticket));
        return Ok(Json(json!({
            "status": "confirmed",
            "token": entry["token"],
        })));
    }
    Ok(Json(json!({"status": entry["status"]})))
}

/// Request payload for confirming a QR login from an authenticated session
#[derive(Debug, Deserialize, ToSchema)]
pub struct QrConfirmDto {
    pub ticket: String,
}

/// Confirm a QR login: the authenticated session grants its identity to the
/// polling client.
pub async fn qr_confirm(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    Json(dto): Json<QrConfirmDto>,
) -> Result<Json<JsonValue>, ApiError> {
    let key = qr_key(&dto.ticket);
    if state.cache.get(&key).is_none() {
        return Err(parse_error("ticket expired"));
    }

    let user = users(&state)
        .get_user(&claims.sub)
        .await?
        .ok_or_else(|| unauthorized(None))?;
    let token = issue_token(&state.config, &user)?;

    state.cache.set(
        key,
        json!({"status": "confirmed", "token": token}),
        Some(code_ttl(&state)),
    );
    Ok(Json(json!({"detail": "confirmed"})))
}

/// Request payload for creating a user
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserDto {
    #[serde(default = "default_sys")]
    pub sys_id: i32,
    #[serde(default = "default_sys")]
    pub org_id: i32,
    pub username: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub is_superuser: bool,
}

/// Create a user (superuser only).
pub async fn create_user(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    Json(dto): Json<CreateUserDto>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    if !claims.is_superuser {
        return Err(crate::error::forbidden(None));
    }

    let user = users(&state)
        .create_user(CreateUserRequest {
            sys_id: dto.sys_id,
            org_id: dto.org_id,
            username: dto.username,
            phone: dto.phone,
            email: dto.email,
            password: dto.password,
            is_superuser: dto.is_superuser,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(user).unwrap_or(JsonValue::Null)),
    ))
}

/// The authenticated caller's claims.
pub async fn me(CurrentUser(claims): CurrentUser) -> Json<JsonValue> {
    Json(json!({
        "id": claims.sub,
        "sys_id": claims.sys_id,
        "org_id": claims.org_id,
        "username": claims.username,
        "is_superuser": claims.is_superuser,
    }))
}
