//! 测试公共模块
//! 提供测试配置、已写入演示数据的应用状态和请求辅助函数

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use erp_context::{
    config::{
        AppConfig, HierarchyConfig, LoggingConfig, SecurityConfig, SeedConfig, ServerConfig,
        SessionConfig,
    },
    db::Store,
    middleware::AppState,
    routes, seed,
};
use http_body_util::BodyExt;
use secrecy::Secret;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const DEMO_PASSWORD: &str = "Demo-Passw0rd";

/// 创建测试配置
pub fn create_test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            addr: "127.0.0.1:0".to_string(), // 使用随机端口
            graceful_shutdown_timeout_secs: 5,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig {
            jwt_secret: Secret::new("test-secret-key-for-testing-only-min-32-chars".to_string()),
            access_token_exp_secs: 300,   // 5分钟用于测试
            refresh_token_exp_secs: 3600, // 1小时用于测试
            password_min_length: 8,
            password_require_uppercase: true,
            password_require_digit: true,
            max_login_attempts: 3,
            login_lockout_duration_secs: 300,
            // 低成本哈希，加快测试
            password_hash_memory_kib: 1024,
            password_hash_iterations: 1,
            secure_cookies: false,
        },
        session: SessionConfig {
            refresh_threshold_secs: 60,
            expiry_check_interval_secs: 30,
            event_bus_capacity: 64,
            token_cleanup_interval_secs: 3600,
        },
        hierarchy: HierarchyConfig::default(),
        seed: SeedConfig {
            demo: true,
            demo_password: Secret::new(DEMO_PASSWORD.to_string()),
        },
    }
}

/// 创建写入演示数据的应用状态
pub async fn create_test_app_state_with(config: AppConfig) -> Arc<AppState> {
    let store = Store::new();
    seed::seed_demo(&store, &config.seed, &config.security)
        .await
        .expect("Failed to seed demo data");

    Arc::new(AppState::new(config, store).expect("Failed to build app state"))
}

pub async fn create_test_app_state() -> Arc<AppState> {
    create_test_app_state_with(create_test_config()).await
}

pub async fn create_test_app() -> (Router, Arc<AppState>) {
    let state = create_test_app_state().await;
    (routes::create_router(state.clone()), state)
}

/// 测试响应
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub text: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.text).unwrap_or(Value::Null)
    }
}

/// 发送请求
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();

    TestResponse {
        status,
        headers,
        text: String::from_utf8_lossy(&bytes).to_string(),
    }
}

pub async fn get(app: &Router, uri: &str, token: &str) -> TestResponse {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post(app: &Router, uri: &str, token: &str, body: Value) -> TestResponse {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

/// 登录并返回响应 JSON
pub async fn login(app: &Router, username: &str, company_id: Option<Uuid>) -> Value {
    let response = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({
            "username": username,
            "password": DEMO_PASSWORD,
            "company_id": company_id,
        })),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.text);
    response.json()
}

/// 登录并返回访问令牌
pub async fn login_token(app: &Router, username: &str, company_id: Option<Uuid>) -> String {
    login(app, username, company_id).await["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}

/// 响应中的 accessible_company_ids 集合
pub fn accessible_ids(context: &Value) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = context["accessible_company_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().parse().unwrap())
        .collect();
    ids.sort();
    ids
}

pub fn sorted(mut ids: Vec<Uuid>) -> Vec<Uuid> {
    ids.sort();
    ids
}
