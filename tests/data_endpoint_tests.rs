//! End-to-end tests for the generic data endpoints: tenant isolation,
//! alias round-trips, filtering, the bulk all-rows guard and plan cache
//! behavior.

mod test_utils;

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use test_utils::{body_json, delete, get, post_json, put_json, seed_template, test_app};

const FIELDS: &[test_utils::FieldSpec<'static>] = &[
    ("name", "field_01", true, true, false),
    ("age", "int_01", true, false, false),
];

#[tokio::test]
async fn test_create_with_matching_sys_id_succeeds() {
    let (state, app) = test_app().await;
    let template_id = seed_template(&state, 1, "formdata", "People", FIELDS).await;

    let response = app
        .oneshot(post_json(
            "/api/v1/data",
            &json!({"template_id": template_id, "sys_id": 1, "name": "abc", "age": 20}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["name"], json!("abc"));
    assert_eq!(body["age"], json!(20));
    assert_eq!(body["template_id"], json!(template_id));
    assert!(body["id"].as_str().unwrap().starts_with('D'));
}

#[tokio::test]
async fn test_create_with_wrong_sys_id_rejected() {
    let (state, app) = test_app().await;
    let template_id = seed_template(&state, 1, "formdata", "People", FIELDS).await;

    let response = app
        .oneshot(post_json(
            "/api/v1/data",
            &json!({"template_id": template_id, "sys_id": 2, "name": "abc"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], json!("sys_id error!"));
}

#[tokio::test]
async fn test_missing_template_is_rejected() {
    let (_state, app) = test_app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/data",
            &json!({"template_id": "FT-missing", "sys_id": 1, "name": "abc"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], json!("Bad template_id"));

    let response = app
        .oneshot(post_json("/api/v1/data", &json!({"sys_id": 1, "name": "x"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_alias_round_trip_on_retrieve() {
    let (state, app) = test_app().await;
    let template_id = seed_template(&state, 1, "formdata", "People", FIELDS).await;

    let created = body_json(
        app.clone()
            .oneshot(post_json(
                "/api/v1/data",
                &json!({"template_id": template_id, "sys_id": 1, "name": "abc", "age": 5}),
            ))
            .await
            .unwrap(),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .oneshot(get(&format!(
            "/api/v1/data/{id}?template_id={template_id}&sys_id=1"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let row = body_json(response).await;
    // The alias, not the physical column, appears in the output.
    assert_eq!(row["age"], json!(5));
    assert_eq!(row["name"], json!("abc"));
    assert!(row.get("int_01").is_none());
    assert!(row.get("field_01").is_none());
}

#[tokio::test]
async fn test_list_envelope_and_filters() {
    let (state, app) = test_app().await;
    let template_id = seed_template(&state, 1, "formdata", "People", FIELDS).await;

    for (name, age) in [("abc", 5), ("def", 9), ("ghi", 5)] {
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/data",
                &json!({"template_id": template_id, "sys_id": 1, "name": name, "age": age}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .clone()
        .oneshot(get(&format!(
            "/api/v1/data?template_id={template_id}&sys_id=1&age=5"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["count"], json!(2));
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert!(body.get("next").is_some());
    assert!(body.get("previous").is_some());

    // Comma-separated values filter as IN.
    let body = body_json(
        app.oneshot(get(&format!(
            "/api/v1/data?template_id={template_id}&sys_id=1&name=abc,def"
        )))
        .await
        .unwrap(),
    )
    .await;
    assert_eq!(body["count"], json!(2));
}

#[tokio::test]
async fn test_bulk_delete_refuses_full_set() {
    let (state, app) = test_app().await;
    let template_id = seed_template(&state, 1, "formdata", "People", FIELDS).await;

    for name in ["abc", "def", "ghi"] {
        app.clone()
            .oneshot(post_json(
                "/api/v1/data",
                &json!({"template_id": template_id, "sys_id": 1, "name": name}),
            ))
            .await
            .unwrap();
    }

    // An empty query object matches everything: rejected.
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/databulkdelete",
            &json!({"template_id": template_id, "sys_id": 1, "querys": {}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], json!("Not allowed to delete all data"));

    // A narrowing filter deletes only the matching rows.
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/databulkdelete",
            &json!({"template_id": template_id, "sys_id": 1, "querys": {"name": "abc,def"}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["deleted"].as_array().unwrap().len(), 2);

    let remaining = body_json(
        app.oneshot(get(&format!(
            "/api/v1/data?template_id={template_id}&sys_id=1"
        )))
        .await
        .unwrap(),
    )
    .await;
    assert_eq!(remaining["count"], json!(1));
}

#[tokio::test]
async fn test_bulk_delete_allows_single_row_full_match() {
    let (state, app) = test_app().await;
    let template_id = seed_template(&state, 1, "formdata", "People", FIELDS).await;

    app.clone()
        .oneshot(post_json(
            "/api/v1/data",
            &json!({"template_id": template_id, "sys_id": 1, "name": "only"}),
        ))
        .await
        .unwrap();

    // One row equals the full set, but the guard only trips above one.
    let response = app
        .oneshot(post_json(
            "/api/v1/databulkdelete",
            &json!({"template_id": template_id, "sys_id": 1, "querys": {}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["deleted"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_bulk_update_guard_and_strip() {
    let (state, app) = test_app().await;
    let template_id = seed_template(&state, 1, "formdata", "People", FIELDS).await;

    for (name, age) in [("abc", 5), ("def", 9)] {
        app.clone()
            .oneshot(post_json(
                "/api/v1/data",
                &json!({"template_id": template_id, "sys_id": 1, "name": name, "age": age}),
            ))
            .await
            .unwrap();
    }

    // Matching everything is rejected.
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/databulkupdate",
            &json!({
                "template_id": template_id,
                "sys_id": 1,
                "querys": {},
                "update_fields": {"age": 1}
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // A narrowed update succeeds and ignores tenant identity fields.
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/databulkupdate",
            &json!({
                "template_id": template_id,
                "sys_id": 1,
                "querys": {"name": "abc"},
                "update_fields": {"age": 42, "sys_id": 99, "org_id": 99}
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["updated"], json!(1));

    let rows = body_json(
        app.oneshot(get(&format!(
            "/api/v1/data?template_id={template_id}&sys_id=1&name=abc"
        )))
        .await
        .unwrap(),
    )
    .await;
    let row = &rows["data"][0];
    assert_eq!(row["age"], json!(42));
    assert_eq!(row["sys_id"], json!(1));
}

#[tokio::test]
async fn test_unique_field_scoped_to_org() {
    let (state, app) = test_app().await;
    let template_id = seed_template(
        &state,
        1,
        "formdata",
        "People",
        &[("name", "field_01", true, true, true)],
    )
    .await;

    let first = app
        .clone()
        .oneshot(post_json(
            "/api/v1/data",
            &json!({"template_id": template_id, "sys_id": 1, "org_id": 7, "name": "abc"}),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    // Same value in the same org: rejected.
    let duplicate = app
        .clone()
        .oneshot(post_json(
            "/api/v1/data",
            &json!({"template_id": template_id, "sys_id": 1, "org_id": 7, "name": "abc"}),
        ))
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);
    assert!(
        body_json(duplicate).await["message"]
            .as_str()
            .unwrap()
            .contains("already exists")
    );

    // Same value in another org: allowed.
    let other_org = app
        .oneshot(post_json(
            "/api/v1/data",
            &json!({"template_id": template_id, "sys_id": 1, "org_id": 8, "name": "abc"}),
        ))
        .await
        .unwrap();
    assert_eq!(other_org.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_src_id_partition_derived_on_create() {
    let (state, app) = test_app().await;
    let template_id = seed_template(&state, 1, "formdata", "People", FIELDS).await;

    let created = body_json(
        app.oneshot(post_json(
            "/api/v1/data",
            &json!({"template_id": template_id, "sys_id": 1, "org_id": 123, "name": "abc"}),
        ))
        .await
        .unwrap(),
    )
    .await;
    assert_eq!(created["src_id"], json!(23));
}

#[tokio::test]
async fn test_field_edit_invalidates_plan_for_requests() {
    let (state, app) = test_app().await;
    let template_id = seed_template(
        &state,
        1,
        "formdata",
        "People",
        &[("name", "field_01", true, true, false)],
    )
    .await;

    // Warm the plan.
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/data",
            &json!({"template_id": template_id, "sys_id": 1, "name": "abc", "age": 7}),
        ))
        .await
        .unwrap();
    let created = body_json(response).await;
    // age has no descriptor yet, so it was ignored.
    assert!(created.get("age").is_none());

    // Adding a field evicts the cached plan; the next request sees it.
    seed_template_field(&state, &template_id, "age", "int_01").await;

    let response = app
        .oneshot(post_json(
            "/api/v1/data",
            &json!({"template_id": template_id, "sys_id": 1, "name": "def", "age": 7}),
        ))
        .await
        .unwrap();
    let created = body_json(response).await;
    assert_eq!(created["age"], json!(7));
}

async fn seed_template_field(
    state: &formbase::server::AppState,
    template_id: &str,
    alias: &str,
    col_name: &str,
) {
    use formbase::repositories::TemplateRepository;
    use formbase::repositories::template::CreateFieldRequest;

    TemplateRepository::new(&state.db, &state.plans, &state.idgen)
        .create_field(CreateFieldRequest {
            template_id: template_id.to_string(),
            col_title: alias.to_string(),
            alias: alias.to_string(),
            col_name: col_name.to_string(),
            in_filter: true,
            is_required: false,
            widget: None,
            widget_attr: None,
            verify_exp: None,
            related_template_id: None,
            local_data_source: None,
            sort_num: 2,
            is_related: false,
            desc: None,
            unique_in_org: false,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_update_and_delete_row() {
    let (state, app) = test_app().await;
    let template_id = seed_template(&state, 1, "formdata", "People", FIELDS).await;

    let created = body_json(
        app.clone()
            .oneshot(post_json(
                "/api/v1/data",
                &json!({"template_id": template_id, "sys_id": 1, "name": "abc", "age": 5}),
            ))
            .await
            .unwrap(),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    // Full update with the wrong sys_id is rejected before touching data.
    let response = app
        .clone()
        .oneshot(put_json(
            &format!("/api/v1/data/{id}"),
            &json!({"template_id": template_id, "sys_id": 9, "name": "xyz"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(put_json(
            &format!("/api/v1/data/{id}"),
            &json!({"template_id": template_id, "sys_id": 1, "name": "xyz", "age": 6}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], json!("xyz"));

    let response = app
        .clone()
        .oneshot(delete(&format!(
            "/api/v1/data/{id}?template_id={template_id}&sys_id=1"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(get(&format!(
            "/api/v1/data/{id}?template_id={template_id}&sys_id=1"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_aggregate_endpoint() {
    let (state, app) = test_app().await;
    let template_id = seed_template(&state, 1, "formdata", "People", FIELDS).await;

    // Configure sum(age) as "age_total".
    let repo = formbase::repositories::TemplateRepository::new(&state.db, &state.plans, &state.idgen);
    let fields = repo.list_fields(&template_id).await.unwrap();
    let age_field = fields.iter().find(|f| f.alias == "age").unwrap();
    repo.create_aggregate_field(&template_id, &age_field.id, "sum", "age_total", None)
        .await
        .unwrap();

    for age in [5, 9, 6] {
        app.clone()
            .oneshot(post_json(
                "/api/v1/data",
                &json!({"template_id": template_id, "sys_id": 1, "name": format!("p{age}"), "age": age}),
            ))
            .await
            .unwrap();
    }

    let response = app
        .oneshot(get(&format!(
            "/api/v1/dataaggregate?template_id={template_id}&sys_id=1&age_range_min=6"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["age_total"], json!(15));
}
