//! 切换公司与会话上下文集成测试

use axum::http::{header, Method, StatusCode};
use erp_context::{
    realtime::SessionEvent,
    seed::{
        ADMIN_USER_ID, BRANCH_NY_ID, CLERK_USER_ID, HOLDING_ID, SUBSIDIARY_EU_ID, SUBSIDIARY_US_ID,
    },
};
use serde_json::json;

mod common;
use common::{accessible_ids, create_test_app, get, login, login_token, post, send, sorted};

#[tokio::test]
async fn test_switch_company_returns_new_context() {
    let (app, _) = create_test_app().await;
    let session = login(&app, "admin", None).await;
    let token = session["access_token"].as_str().unwrap();

    let response = post(
        &app,
        "/api/session/switch-company",
        token,
        json!({"company_id": SUBSIDIARY_US_ID}),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    let json = response.json();
    assert_ne!(json["access_token"], session["access_token"]);
    assert!(response.headers.contains_key(header::SET_COOKIE));

    let context = &json["context"];
    assert_eq!(context["active_company"]["id"], SUBSIDIARY_US_ID.to_string());
    assert_eq!(context["role"]["name"], "controller");
    assert_eq!(context["parent_company"]["id"], HOLDING_ID.to_string());
    assert_eq!(
        accessible_ids(context),
        sorted(vec![SUBSIDIARY_US_ID, BRANCH_NY_ID])
    );

    // 新令牌携带新公司
    let me = get(&app, "/api/auth/me", json["access_token"].as_str().unwrap()).await;
    assert_eq!(me.json()["active_company"]["id"], SUBSIDIARY_US_ID.to_string());
}

#[tokio::test]
async fn test_switch_company_via_auth_alias() {
    let (app, _) = create_test_app().await;
    let token = login_token(&app, "admin", None).await;

    let response = post(
        &app,
        "/api/auth/switch-company",
        &token,
        json!({"company_id": SUBSIDIARY_EU_ID}),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    let context = &response.json()["context"];
    assert_eq!(accessible_ids(context), vec![SUBSIDIARY_EU_ID]);
    // 没有下级公司，不能合并
    assert_eq!(context["can_consolidate"], false);
}

#[tokio::test]
async fn test_switch_to_company_without_grant_is_forbidden() {
    let (app, _) = create_test_app().await;
    let token = login_token(&app, "clerk", None).await;

    let response = post(
        &app,
        "/api/session/switch-company",
        &token,
        json!({"company_id": HOLDING_ID}),
    )
    .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    // 原令牌仍然有效
    let me = get(&app, "/api/auth/me", &token).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.json()["active_company"]["id"], BRANCH_NY_ID.to_string());
}

#[tokio::test]
async fn test_switch_revokes_refresh_token_from_cookie() {
    let (app, _) = create_test_app().await;
    let session = login(&app, "admin", None).await;
    let refresh_token = session["refresh_token"].as_str().unwrap();

    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/api/session/switch-company")
        .header(
            header::AUTHORIZATION,
            format!("Bearer {}", session["access_token"].as_str().unwrap()),
        )
        .header(header::COOKIE, format!("refresh_token={}", refresh_token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from(
            json!({"company_id": BRANCH_NY_ID}).to_string(),
        ))
        .unwrap();
    let response = tower::ServiceExt::oneshot(app.clone(), request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let refresh = send(
        &app,
        Method::POST,
        "/api/auth/refresh",
        None,
        Some(json!({"refresh_token": refresh_token})),
    )
    .await;
    assert_eq!(refresh.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_switch_publishes_events() {
    let (app, state) = create_test_app().await;
    let token = login_token(&app, "admin", None).await;
    let mut events = state.event_bus.subscribe();

    let response = post(
        &app,
        "/api/session/switch-company",
        &token,
        json!({"company_id": SUBSIDIARY_US_ID}),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }

    assert!(received.contains(&SessionEvent::CompanySwitched {
        user_id: ADMIN_USER_ID,
        from_company_id: HOLDING_ID,
        to_company_id: SUBSIDIARY_US_ID,
    }));
    let invalidated: Vec<_> = received
        .iter()
        .filter_map(|e| match e {
            SessionEvent::CacheInvalidated { company_id, reason, .. } => {
                Some((*company_id, reason.as_str()))
            }
            _ => None,
        })
        .collect();
    assert!(invalidated.contains(&(HOLDING_ID, "company_switch")));
    assert!(invalidated.contains(&(SUBSIDIARY_US_ID, "company_switch")));
}

#[tokio::test]
async fn test_session_context_for_self() {
    let (app, _) = create_test_app().await;
    let token = login_token(&app, "clerk", None).await;

    let response = get(
        &app,
        &format!("/api/session/context?user={}&company={}", CLERK_USER_ID, BRANCH_NY_ID),
        &token,
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    let json = response.json();
    assert_eq!(json["company_level"], "branch");
    assert_eq!(accessible_ids(&json), vec![BRANCH_NY_ID]);
    assert_eq!(
        json["ancestor_ids"],
        json!([SUBSIDIARY_US_ID, HOLDING_ID])
    );
}

#[tokio::test]
async fn test_session_context_for_other_user_requires_permission() {
    let (app, _) = create_test_app().await;

    // 职员没有 read:sessions
    let clerk = login_token(&app, "clerk", None).await;
    let uri = format!("/api/session/context?user={}&company={}", ADMIN_USER_ID, HOLDING_ID);
    let response = get(&app, &uri, &clerk).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    // 管理员可以查询职员
    let admin = login_token(&app, "admin", None).await;
    let uri = format!("/api/session/context?user={}&company={}", CLERK_USER_ID, BRANCH_NY_ID);
    let response = get(&app, &uri, &admin).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["username"], "clerk");

    // 职员在控股公司没有授权
    let uri = format!("/api/session/context?user={}&company={}", CLERK_USER_ID, HOLDING_ID);
    let response = get(&app, &uri, &admin).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_session_context_requires_query() {
    let (app, _) = create_test_app().await;
    let token = login_token(&app, "admin", None).await;

    let response = get(&app, "/api/session/context", &token).await;
    assert!(response.status.is_client_error());
}
