//! # System Log Handlers
//!
//! Read-only access to the audit trail.

use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::response::Json;
use serde_json::Value as JsonValue;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::pagination::{page_params, paginate};
use crate::repositories::SystemLogRepository;
use crate::server::AppState;

pub async fn list_logs(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<JsonValue>, ApiError> {
    let paging = page_params(&params);
    let sys_id = params.get("sys_id").and_then(|v| v.parse::<i32>().ok());

    let (count, items) = SystemLogRepository::new(&state.db, &state.idgen)
        .list(
            sys_id,
            params.get("template_id").map(String::as_str),
            params.get("log_type").map(String::as_str),
            paging.page,
            paging.page_size,
        )
        .await?;

    let envelope = paginate("/api/v1/systemlogs", &params, paging, count, items);
    Ok(Json(serde_json::to_value(envelope).unwrap_or(JsonValue::Null)))
}
