//! Shared helpers for endpoint integration tests.
#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use formbase::config::AppConfig;
use formbase::repositories::TemplateRepository;
use formbase::repositories::template::{CreateFieldRequest, CreateTemplateRequest};
use formbase::server::{AppState, create_app};
use migration::MigratorTrait;
use serde_json::Value;

/// Fresh application state over an in-memory database with migrations
/// applied and the background worker running.
pub async fn test_state() -> AppState {
    let config = AppConfig {
        profile: "test".to_string(),
        jwt_secret: "test-jwt-secret".to_string(),
        database_url: "sqlite::memory:".to_string(),
        ..Default::default()
    };

    let db = sea_orm::Database::connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory database");
    migration::Migrator::up(&db, None)
        .await
        .expect("migrations failed");

    AppState::new(config, db)
}

pub async fn test_app() -> (AppState, Router) {
    let state = test_state().await;
    let app = create_app(state.clone());
    (state, app)
}

/// Field descriptor shorthand: (alias, col_name, in_filter, is_required,
/// unique_in_org).
pub type FieldSpec<'a> = (&'a str, &'a str, bool, bool, bool);

/// Seed a template with field descriptors; returns the template id.
pub async fn seed_template(
    state: &AppState,
    sys_id: i32,
    api_name: &str,
    title: &str,
    fields: &[FieldSpec<'_>],
) -> String {
    let repo = TemplateRepository::new(&state.db, &state.plans, &state.idgen);
    let template = repo
        .create_template(CreateTemplateRequest {
            sys_id,
            org_id: 1,
            biz_id: 1,
            src_id: 1,
            api_name: api_name.to_string(),
            title: title.to_string(),
            form_type: 1,
            sort_num: 1,
            category: None,
            keyword: None,
            remark: None,
            parent_id: None,
            need_login: false,
        })
        .await
        .expect("failed to seed template");

    for (alias, col_name, in_filter, is_required, unique_in_org) in fields {
        repo.create_field(CreateFieldRequest {
            template_id: template.id.clone(),
            col_title: alias.to_string(),
            alias: alias.to_string(),
            col_name: col_name.to_string(),
            in_filter: *in_filter,
            is_required: *is_required,
            widget: None,
            widget_attr: None,
            verify_exp: None,
            related_template_id: None,
            local_data_source: None,
            sort_num: 1,
            is_related: false,
            desc: None,
            unique_in_org: *unique_in_org,
        })
        .await
        .expect("failed to seed field");
    }

    template.id
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn put_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is not JSON")
    }
}
