//! 公司层级与数据范围集成测试

use axum::http::{header, Method, StatusCode};
use erp_context::{
    config::HierarchyConfig,
    routes,
    seed::{
        ADMIN_ROLE_ID, ADMIN_USER_ID, BRANCH_NY_ID, HOLDING_ID, SUBSIDIARY_EU_ID, SUBSIDIARY_US_ID,
    },
};
use serde_json::{json, Value};
use uuid::Uuid;

mod common;
use common::{
    accessible_ids, create_test_app, create_test_app_state_with, create_test_config, get, login,
    login_token, post, send, sorted,
};

fn company_ids(list: &Value) -> Vec<Uuid> {
    let ids = list["companies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap().parse().unwrap())
        .collect();
    sorted(ids)
}

#[tokio::test]
async fn test_scope_follows_active_company() {
    let (app, _) = create_test_app().await;

    let cases = [
        (
            HOLDING_ID,
            vec![HOLDING_ID, SUBSIDIARY_US_ID, BRANCH_NY_ID, SUBSIDIARY_EU_ID],
        ),
        (SUBSIDIARY_US_ID, vec![SUBSIDIARY_US_ID, BRANCH_NY_ID]),
        (SUBSIDIARY_EU_ID, vec![SUBSIDIARY_EU_ID]),
        (BRANCH_NY_ID, vec![BRANCH_NY_ID]),
    ];

    for (company_id, expected) in cases {
        let session = login(&app, "admin", Some(company_id)).await;
        assert_eq!(accessible_ids(&session["context"]), sorted(expected.clone()));

        let response = get(&app, "/api/companies", session["access_token"].as_str().unwrap()).await;
        assert_eq!(response.status, StatusCode::OK);
        let json = response.json();
        assert_eq!(company_ids(&json), sorted(expected.clone()));
        assert_eq!(json["count"], expected.len());
    }
}

#[tokio::test]
async fn test_scope_with_ancestors() {
    let mut config = create_test_config();
    config.hierarchy = HierarchyConfig {
        include_ancestors: true,
    };
    let state = create_test_app_state_with(config).await;
    let app = routes::create_router(state);

    let session = login(&app, "admin", Some(SUBSIDIARY_US_ID)).await;
    assert_eq!(
        accessible_ids(&session["context"]),
        sorted(vec![HOLDING_ID, SUBSIDIARY_US_ID, BRANCH_NY_ID])
    );

    // 不能合并时不扩展上级
    let session = login(&app, "admin", Some(BRANCH_NY_ID)).await;
    assert_eq!(accessible_ids(&session["context"]), vec![BRANCH_NY_ID]);
}

#[tokio::test]
async fn test_hierarchy_from_holding() {
    let (app, _) = create_test_app().await;
    let token = login_token(&app, "admin", None).await;

    let response = get(&app, "/api/companies/hierarchy", &token).await;

    assert_eq!(response.status, StatusCode::OK);
    let json = response.json();
    assert_eq!(json["company"]["id"], HOLDING_ID.to_string());
    let children = json["children"].as_array().unwrap();
    assert_eq!(children.len(), 2);

    let us = children
        .iter()
        .find(|c| c["company"]["id"] == SUBSIDIARY_US_ID.to_string())
        .unwrap();
    assert_eq!(us["children"][0]["company"]["id"], BRANCH_NY_ID.to_string());
}

#[tokio::test]
async fn test_hierarchy_limited_to_scope() {
    let (app, _) = create_test_app().await;

    // 分公司职员只看到自己
    let token = login_token(&app, "clerk", None).await;
    let json = get(&app, "/api/companies/hierarchy", &token).await.json();
    assert_eq!(json["company"]["id"], BRANCH_NY_ID.to_string());
    assert!(json["children"].as_array().unwrap().is_empty());

    let token = login_token(&app, "admin", Some(SUBSIDIARY_US_ID)).await;
    let json = get(&app, "/api/companies/hierarchy", &token).await.json();
    assert_eq!(json["company"]["id"], SUBSIDIARY_US_ID.to_string());
    assert_eq!(json["children"].as_array().unwrap().len(), 1);
    assert_eq!(json["children"][0]["company"]["id"], BRANCH_NY_ID.to_string());
}

#[tokio::test]
async fn test_hierarchy_with_ancestors_skips_siblings() {
    let mut config = create_test_config();
    config.hierarchy = HierarchyConfig {
        include_ancestors: true,
    };
    let state = create_test_app_state_with(config).await;
    let app = routes::create_router(state);

    let token = login_token(&app, "admin", Some(SUBSIDIARY_US_ID)).await;
    let json = get(&app, "/api/companies/hierarchy", &token).await.json();

    assert_eq!(json["company"]["id"], HOLDING_ID.to_string());
    let children = json["children"].as_array().unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0]["company"]["id"], SUBSIDIARY_US_ID.to_string());
    assert_eq!(
        children[0]["children"][0]["company"]["id"],
        BRANCH_NY_ID.to_string()
    );
}

#[tokio::test]
async fn test_create_company_derives_level_and_root() {
    let (app, _) = create_test_app().await;
    let token = login_token(&app, "admin", None).await;

    let response = post(
        &app,
        "/api/companies",
        &token,
        json!({
            "name": "Acme Boston",
            "code": "ACME-US-BOS",
            "company_type": "branch",
            "parent_id": SUBSIDIARY_US_ID,
            "currency": "usd",
        }),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let boston = response.json();
    assert_eq!(boston["level"], 3);
    assert_eq!(boston["root_id"], HOLDING_ID.to_string());
    assert_eq!(boston["currency"], "USD");

    let response = post(
        &app,
        "/api/companies",
        &token,
        json!({
            "name": "Acme Boston Retail",
            "code": "ACME-BOS-RT",
            "company_type": "division",
            "parent_id": boston["id"],
            "currency": "USD",
        }),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.json()["level"], 4);

    // 新公司立即进入合并范围
    let session = login(&app, "admin", Some(SUBSIDIARY_US_ID)).await;
    assert_eq!(accessible_ids(&session["context"]).len(), 4);
}

#[tokio::test]
async fn test_create_root_company() {
    let (app, _) = create_test_app().await;
    let token = login_token(&app, "admin", None).await;

    let response = post(
        &app,
        "/api/companies",
        &token,
        json!({
            "name": "Globex",
            "code": "GLOBEX",
            "company_type": "holding",
            "parent_id": null,
            "currency": "GBP",
        }),
    )
    .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let json = response.json();
    assert_eq!(json["level"], 1);
    assert_eq!(json["root_id"], json["id"]);
}

#[tokio::test]
async fn test_create_company_validation() {
    let (app, _) = create_test_app().await;
    let token = login_token(&app, "admin", None).await;

    let response = post(
        &app,
        "/api/companies",
        &token,
        json!({
            "name": "Bad",
            "code": "bad code",
            "company_type": "branch",
            "parent_id": HOLDING_ID,
            "currency": "USD",
        }),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    let response = post(
        &app,
        "/api/companies",
        &token,
        json!({
            "name": "Orphan",
            "code": "ORPHAN",
            "company_type": "branch",
            "parent_id": Uuid::new_v4(),
            "currency": "USD",
        }),
    )
    .await;
    // 父公司不在数据范围内
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_under_parent_outside_scope() {
    let (app, _) = create_test_app().await;

    // 在欧洲子公司授予管理员角色，数据范围只有它自己
    let holding = login_token(&app, "admin", None).await;
    let response = post(
        &app,
        &format!("/api/users/{}/companies", ADMIN_USER_ID),
        &holding,
        json!({"company_id": SUBSIDIARY_EU_ID, "role_id": ADMIN_ROLE_ID}),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);

    let session = login(&app, "admin", Some(SUBSIDIARY_EU_ID)).await;
    assert_eq!(session["context"]["role"]["name"], "admin");
    assert_eq!(accessible_ids(&session["context"]), vec![SUBSIDIARY_EU_ID]);
    let token = session["access_token"].as_str().unwrap();

    let response = post(
        &app,
        "/api/companies",
        token,
        json!({
            "name": "Acme Chicago",
            "code": "ACME-US-CHI",
            "company_type": "branch",
            "parent_id": SUBSIDIARY_US_ID,
            "currency": "USD",
        }),
    )
    .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_clerk_cannot_create_company() {
    let (app, _) = create_test_app().await;
    let token = login_token(&app, "clerk", None).await;

    let response = post(
        &app,
        "/api/companies",
        &token,
        json!({
            "name": "Acme Queens",
            "code": "ACME-NY-Q",
            "company_type": "division",
            "parent_id": BRANCH_NY_ID,
            "currency": "USD",
        }),
    )
    .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_get_company_outside_scope() {
    let (app, _) = create_test_app().await;
    let token = login_token(&app, "admin", Some(SUBSIDIARY_EU_ID)).await;

    let response = get(&app, &format!("/api/companies/{}", SUBSIDIARY_EU_ID), &token).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["code"], "ACME-EU");

    let response = get(&app, &format!("/api/companies/{}", SUBSIDIARY_US_ID), &token).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_update_company() {
    let (app, _) = create_test_app().await;
    let token = login_token(&app, "admin", None).await;

    let response = send(
        &app,
        Method::PUT,
        &format!("/api/companies/{}", SUBSIDIARY_EU_ID),
        Some(&token),
        Some(json!({"name": "Acme Europe GmbH"})),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    let json = response.json();
    assert_eq!(json["name"], "Acme Europe GmbH");
    assert_eq!(json["code"], "ACME-EU");
    assert_eq!(json["level"], 2);
}

#[tokio::test]
async fn test_export_companies_csv() {
    let (app, _) = create_test_app().await;
    let token = login_token(&app, "admin", None).await;

    send(
        &app,
        Method::PUT,
        &format!("/api/companies/{}", SUBSIDIARY_EU_ID),
        Some(&token),
        Some(json!({"name": "Acme Europe, \"EU\""})),
    )
    .await;

    let response = get(&app, "/api/companies/export", &token).await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    let disposition = response.headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"companies_"));
    assert!(disposition.ends_with(".csv\""));

    let lines: Vec<&str> = response.text.split("\r\n").filter(|l| !l.is_empty()).collect();
    assert_eq!(lines[0], "code,name,type,level,parent_code,currency,active");
    assert_eq!(lines.len(), 5);
    assert!(lines.contains(&"ACME-US-NY,Acme New York,branch,3,ACME-US,USD,true"));
    assert!(lines.contains(&"ACME-EU,\"Acme Europe, \"\"EU\"\"\",subsidiary,2,ACME,EUR,true"));
}

#[tokio::test]
async fn test_export_limited_to_scope() {
    let (app, _) = create_test_app().await;
    let token = login_token(&app, "admin", Some(SUBSIDIARY_US_ID)).await;

    let response = get(&app, "/api/companies/export", &token).await;

    assert_eq!(response.status, StatusCode::OK);
    let rows = response.text.split("\r\n").filter(|l| !l.is_empty()).count();
    assert_eq!(rows, 3);
    assert!(!response.text.contains("ACME-EU"));
}
