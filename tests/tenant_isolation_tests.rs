//! Tenant isolation across the generic data surface: templates in different
//! tenants never see each other's rows, need_login templates reject
//! anonymous callers, and login flows issue working bearer tokens.

mod test_utils;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use formbase::repositories::TemplateRepository;
use formbase::repositories::user::CreateUserRequest;
use test_utils::{body_json, get, post_json, seed_template, test_app};

const FIELDS: &[test_utils::FieldSpec<'static>] = &[("name", "field_01", true, true, false)];

#[tokio::test]
async fn test_rows_isolated_between_templates() {
    let (state, app) = test_app().await;
    let tenant_a = seed_template(&state, 1, "formdata", "Tenant A", FIELDS).await;
    let tenant_b = seed_template(&state, 2, "formdata", "Tenant B", FIELDS).await;

    app.clone()
        .oneshot(post_json(
            "/api/v1/data",
            &json!({"template_id": tenant_a, "sys_id": 1, "name": "a-row"}),
        ))
        .await
        .unwrap();

    // Tenant B's template sees no rows.
    let body = body_json(
        app.clone()
            .oneshot(get(&format!("/api/v1/data?template_id={tenant_b}&sys_id=2")))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["count"], json!(0));

    // Tenant A's rows cannot be read through tenant B's sys_id.
    let response = app
        .oneshot(get(&format!("/api/v1/data?template_id={tenant_a}&sys_id=2")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], json!("sys_id error!"));
}

#[tokio::test]
async fn test_need_login_template_rejects_anonymous() {
    let (state, app) = test_app().await;
    let template_id = seed_template(&state, 1, "formdata", "Private", FIELDS).await;

    // Flip need_login on.
    let repo = TemplateRepository::new(&state.db, &state.plans, &state.idgen);
    let patch = json!({"need_login": true});
    repo.update_template(&template_id, patch.as_object().unwrap())
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(get(&format!(
            "/api/v1/data?template_id={template_id}&sys_id=1"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // An authenticated caller passes.
    let token = login_token(&state, &app).await;
    let request = Request::builder()
        .method("GET")
        .uri(format!("/api/v1/data?template_id={template_id}&sys_id=1"))
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

async fn login_token(state: &formbase::server::AppState, app: &axum::Router) -> String {
    formbase::repositories::UserRepository::new(&state.db, &state.idgen, &state.config.jwt_secret)
        .create_user(CreateUserRequest {
            sys_id: 1,
            org_id: 1,
            username: "alice".to_string(),
            phone: None,
            email: None,
            password: Some("s3cret!".to_string()),
            is_superuser: false,
        })
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/auth/login",
            &json!({"sys_id": 1, "username": "alice", "password": "s3cret!"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_password_login_and_me() {
    let (state, app) = test_app().await;
    let token = login_token(&state, &app).await;

    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/auth/me")
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["username"], json!("alice"));

    // Anonymous /me is rejected.
    let response = app.oneshot(get("/api/v1/auth/me")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_password_rejected() {
    let (state, app) = test_app().await;
    let _ = login_token(&state, &app).await;

    let response = app
        .oneshot(post_json(
            "/api/v1/auth/login",
            &json!({"sys_id": 1, "username": "alice", "password": "wrong"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_mutations_require_auth() {
    let (_state, app) = test_app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/templates",
            &json!({"sys_id": 1, "title": "T", "api_name": "formdata"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Reads stay open.
    let response = app.oneshot(get("/api/v1/templates")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_garbage_bearer_token_rejected() {
    let (_state, app) = test_app().await;

    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/templates")
        .header("Authorization", "Bearer not-a-token")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
