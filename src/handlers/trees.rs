//! # Tree Handlers
//!
//! Category/org/permission trees: nested rendering, node CRUD, move and
//! subtree copy.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use utoipa::ToSchema;

use crate::auth::CurrentUser;
use crate::error::{ApiError, parse_error};
use crate::repositories::TreeRepository;
use crate::repositories::tree::{CreateNodeRequest, MovePosition};
use crate::server::AppState;

fn repo<'a>(state: &'a AppState) -> TreeRepository<'a> {
    TreeRepository::new(&state.db, &state.idgen)
}

/// Request payload for creating a tree node
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateNodeDto {
    #[serde(default = "default_one")]
    pub sys_id: i32,
    #[serde(default = "default_one")]
    pub org_id: i32,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub parent_id: Option<String>,
    pub name: String,
    #[serde(default = "default_one")]
    pub sort_num: i32,
    pub data: Option<String>,
}

fn default_one() -> i32 {
    1
}

fn default_kind() -> String {
    "category".to_string()
}

/// The nested tree for one kind and tenant.
pub async fn get_tree(
    State(state): State<AppState>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Result<Json<JsonValue>, ApiError> {
    let kind = params
        .get("kind")
        .map(String::as_str)
        .unwrap_or("category");
    let sys_id = params
        .get("sys_id")
        .and_then(|v| v.parse::<i32>().ok())
        .ok_or_else(|| parse_error("Bad sys_id"))?;

    Ok(Json(repo(&state).tree(kind, sys_id).await?))
}

pub async fn create_node(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(dto): Json<CreateNodeDto>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    let node = repo(&state)
        .create_node(CreateNodeRequest {
            sys_id: dto.sys_id,
            org_id: dto.org_id,
            kind: dto.kind,
            parent_id: dto.parent_id,
            name: dto.name,
            sort_num: dto.sort_num,
            data: dto.data,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(node).unwrap_or(JsonValue::Null)),
    ))
}

/// Delete a node and its whole subtree.
pub async fn delete_node(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    let deleted = repo(&state).delete_subtree(&id).await?;
    Ok(Json(json!({"deleted": deleted})))
}

/// Request payload for moving a node
#[derive(Debug, Deserialize, ToSchema)]
pub struct MoveNodeDto {
    pub target_id: String,
    /// first-child, last-child, left or right
    pub position: String,
}

/// Move a node relative to a target node of the same tree.
#[utoipa::path(
    post,
    path = "/api/v1/trees/{id}/move",
    security(("bearer_auth" = [])),
    request_body = MoveNodeDto,
    responses(
        (status = 200, description = "Node moved"),
        (status = 400, description = "Bad position or cyclic move", body = ApiError),
        (status = 404, description = "Node or target not found", body = ApiError)
    ),
    tag = "trees"
)]
pub async fn move_node(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
    Json(dto): Json<MoveNodeDto>,
) -> Result<Json<JsonValue>, ApiError> {
    let position = MovePosition::from_str(&dto.position).ok_or_else(|| {
        parse_error(&format!(
            "position not in [first-child, last-child, left, right]! \"{}\"",
            dto.position
        ))
    })?;

    let node = repo(&state).move_node(&id, &dto.target_id, position).await?;
    Ok(Json(serde_json::to_value(node).unwrap_or(JsonValue::Null)))
}

/// Request payload for copying a subtree
#[derive(Debug, Deserialize, ToSchema)]
pub struct CopySubtreeDto {
    pub target_parent_id: Option<String>,
    /// Destination tenant
    pub target_sys_id: i32,
}

/// Copy a subtree, possibly into a different tenant.
pub async fn copy_subtree(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
    Json(dto): Json<CopySubtreeDto>,
) -> Result<(StatusCode, Json<JsonValue>), ApiError> {
    let root = repo(&state)
        .copy_subtree(&id, dto.target_parent_id.as_deref(), dto.target_sys_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(root).unwrap_or(JsonValue::Null)),
    ))
}
