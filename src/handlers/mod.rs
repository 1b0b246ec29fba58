//! # API Handlers
//!
//! This module contains all the HTTP endpoint handlers for the Formbase API.

pub mod accounts;
pub mod data;
pub mod gps;
pub mod notices;
pub mod reports;
pub mod system_logs;
pub mod templates;
pub mod trees;
pub mod users;

use axum::extract::State;
use axum::response::Json;

use crate::error::ApiError;
use crate::models::ServiceInfo;
use crate::server::AppState;

/// Root handler that returns basic service information
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfo)
    ),
    tag = "root"
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

/// Liveness/readiness probe: checks the database connection.
pub async fn healthz(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    crate::db::health_check(&state.db).await?;
    Ok(Json(serde_json::json!({"status": "ok"})))
}
