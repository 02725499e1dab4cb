//! HTTP 中间件与应用状态
//! 请求追踪（trace_id / request_id、指标、日志）

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    auth::jwt::JwtService,
    config::AppConfig,
    db::Store,
    error::AppError,
    realtime::EventBus,
    services::{
        AccessPolicy, AuthService, CompanyService, ContextService, InventoryService, RoleService,
        UserService,
    },
};

/// 应用状态
///
/// 服务用 Arc 包装，多个请求共享同一实例
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: Store,
    pub jwt_service: Arc<JwtService>,
    pub context_service: Arc<ContextService>,
    pub auth_service: Arc<AuthService>,
    pub company_service: Arc<CompanyService>,
    pub user_service: Arc<UserService>,
    pub role_service: Arc<RoleService>,
    pub inventory_service: Arc<InventoryService>,
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    /// 基于配置和存储创建全部服务
    pub fn new(config: AppConfig, db: Store) -> Result<Self, AppError> {
        let jwt_service = Arc::new(JwtService::from_config(&config.security)?);
        let event_bus = Arc::new(EventBus::new(config.session.event_bus_capacity));
        let context_service = Arc::new(ContextService::new(
            db.clone(),
            AccessPolicy::from(&config.hierarchy),
        ));

        let auth_service = Arc::new(AuthService::new(
            db.clone(),
            jwt_service.clone(),
            context_service.clone(),
            event_bus.clone(),
            config.security.clone(),
        )?);
        let user_service = Arc::new(UserService::new(
            db.clone(),
            event_bus.clone(),
            config.security.clone(),
        )?);

        Ok(Self {
            company_service: Arc::new(CompanyService::new(db.clone(), event_bus.clone())),
            role_service: Arc::new(RoleService::new(db.clone())),
            inventory_service: Arc::new(InventoryService::new(db.clone(), event_bus.clone())),
            config,
            db,
            jwt_service,
            context_service,
            auth_service,
            user_service,
            event_bus,
        })
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().clone();
    let uri = req.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    async move {
        let start = Instant::now();

        let mut response = next.run(req).await;

        let elapsed = start.elapsed();
        let status = response.status().as_u16();

        // 指标标签只使用有限取值
        let method_name = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "PUT" => "PUT",
            "DELETE" => "DELETE",
            "PATCH" => "PATCH",
            _ => "UNKNOWN",
        };
        let status_class = match status {
            200..=299 => "2xx",
            300..=399 => "3xx",
            400..=499 => "4xx",
            _ => "5xx",
        };

        metrics::counter!("http_requests_total", "method" => method_name, "status" => status_class)
            .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            uri = %uri,
            status = status,
            elapsed_ms = elapsed.as_millis(),
            "Request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
