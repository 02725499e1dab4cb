//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

use crate::{handlers, middleware::AppState};

/// 请求体上限
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    // 公开端点（健康检查）
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    // 认证路由（无需访问令牌）
    let auth_routes = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/refresh", post(handlers::auth::refresh_token));

    // 需要认证的路由
    let authenticated_routes = Router::new()
        // 会话
        .route("/api/auth/me", get(handlers::auth::get_current_user))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/logout-all", post(handlers::auth::logout_all))
        .route("/api/auth/switch-company", post(handlers::auth::switch_company))
        .route("/api/session/switch-company", post(handlers::auth::switch_company))
        .route("/api/session/context", get(handlers::session::get_context))

        // 公司
        .route(
            "/api/companies",
            get(handlers::company::list_companies).post(handlers::company::create_company),
        )
        .route("/api/companies/hierarchy", get(handlers::company::get_hierarchy))
        .route("/api/companies/export", get(handlers::company::export_companies))
        .route(
            "/api/companies/{id}",
            get(handlers::company::get_company).put(handlers::company::update_company),
        )

        // 用户与角色
        .route("/api/users", post(handlers::user::create_user))
        .route("/api/users/{id}/companies", post(handlers::user::grant_company_access))
        .route(
            "/api/roles",
            get(handlers::role::list_roles).post(handlers::role::create_role),
        )

        // 库存
        .route("/api/companies/{id}/stock", get(handlers::inventory::list_stock))
        .route("/api/companies/{id}/stock/adjust", post(handlers::inventory::adjust_stock))
        .route("/api/companies/{id}/stock/movements", get(handlers::inventory::list_movements))
        .route("/api/companies/{id}/stock/export", get(handlers::inventory::export_stock))

        // 出库单
        .route("/api/companies/{id}/deliveries", post(handlers::inventory::create_delivery))
        .route(
            "/api/companies/{id}/deliveries/{delivery_id}/ready",
            post(handlers::inventory::mark_delivery_ready),
        )
        .route(
            "/api/companies/{id}/deliveries/{delivery_id}/cancel",
            post(handlers::inventory::cancel_delivery),
        )
        .route(
            "/api/companies/{id}/deliveries/{delivery_id}/complete",
            post(handlers::inventory::complete_delivery),
        )

        // 分录
        .route(
            "/api/companies/{id}/journal-entries",
            get(handlers::inventory::list_journal_entries),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::middleware::jwt_auth_middleware,
        ));

    // 组合所有路由
    Router::new()
        .merge(public_routes)
        .merge(auth_routes)
        .merge(authenticated_routes)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(crate::middleware::request_tracking_middleware))
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        )
        .with_state(state)
}
