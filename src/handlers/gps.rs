//! # GPS Handlers
//!
//! Point ingestion, track listing, last-point lookup and cache refresh.

use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use utoipa::ToSchema;

use crate::error::{ApiError, parse_error};
use crate::pagination::{page_params, paginate};
use crate::repositories::GpsRepository;
use crate::repositories::gps::IngestPointRequest;
use crate::server::AppState;

fn repo<'a>(state: &'a AppState) -> GpsRepository<'a> {
    GpsRepository::new(&state.db, &state.cache, &state.idgen)
}

/// Request payload for ingesting a point
#[derive(Debug, Deserialize, ToSchema)]
pub struct IngestPointDto {
    #[serde(default = "default_one")]
    pub sys_id: i32,
    #[serde(default = "default_one")]
    pub org_id: i32,
    pub sn: String,
    pub longitude: f64,
    pub latitude: f64,
    pub altitude: Option<f64>,
    pub speed: Option<f64>,
}

fn default_one() -> i32 {
    1
}

/// Ingest a track point; refreshes the serial's last-point cache entry.
pub async fn ingest_point(
    State(state): State<AppState>,
    Json(dto): Json<IngestPointDto>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    let point = repo(&state)
        .ingest(IngestPointRequest {
            sys_id: dto.sys_id,
            org_id: dto.org_id,
            sn: dto.sn,
            longitude: dto.longitude,
            latitude: dto.latitude,
            altitude: dto.altitude,
            speed: dto.speed,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(point).unwrap_or(JsonValue::Null)),
    ))
}

/// List raw track points.
pub async fn list_points(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<JsonValue>, ApiError> {
    let paging = page_params(&params);
    let parse_i32 = |key: &str| params.get(key).and_then(|v| v.parse::<i32>().ok());

    let (count, items) = repo(&state)
        .list_points(
            parse_i32("sys_id"),
            parse_i32("org_id"),
            params.get("sn").map(String::as_str),
            paging.page,
            paging.page_size,
        )
        .await?;

    let envelope = paginate("/api/v1/gpspoints", &params, paging, count, items);
    Ok(Json(serde_json::to_value(envelope).unwrap_or(JsonValue::Null)))
}

/// Last known position for a serial, tenant-checked, cache-first.
pub async fn last_point(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<JsonValue>, ApiError> {
    let sn = params
        .get("sn")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| parse_error("sn is required"))?;
    let sys_id = params
        .get("sys_id")
        .and_then(|v| v.parse::<i32>().ok())
        .ok_or_else(|| parse_error("Bad sys_id"))?;

    Ok(Json(repo(&state).last_point(sn, sys_id)))
}

/// Request payload for refreshing the last-point cache
#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshDto {
    pub sys_id: Option<i32>,
    pub org_id: Option<i32>,
    #[serde(default)]
    pub sn_list: Vec<String>,
}

/// Rebuild the last-point cache: for specific serials of a tenant, or for
/// everything when no serials are given.
pub async fn refresh_points(
    State(state): State<AppState>,
    Json(dto): Json<RefreshDto>,
) -> Result<Json<JsonValue>, ApiError> {
    let repo = repo(&state);
    let refreshed = if dto.sn_list.is_empty() {
        repo.refresh_all().await?
    } else {
        let sys_id = dto.sys_id.ok_or_else(|| parse_error("Bad sys_id"))?;
        let org_id = dto.org_id.ok_or_else(|| parse_error("Bad org_id"))?;
        repo.refresh(sys_id, org_id, &dto.sn_list).await?
    };

    Ok(Json(json!({"refreshed": refreshed})))
}
