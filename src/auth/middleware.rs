//! JWT 认证中间件
//! 校验 Bearer 令牌并为请求解析会话上下文

use crate::{auth::jwt::Claims, error::AppError, middleware::AppState, models::session::SessionContext};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

/// 刷新令牌 Cookie 名称
pub const REFRESH_COOKIE: &str = "refresh_token";

/// 认证上下文（附加到请求扩展）
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub claims: Claims,
    /// 按令牌中的公司实时解析，角色变更无需重新登录即可生效
    pub session: Arc<SessionContext>,
}

impl AuthContext {
    /// 要求权限，否则 Forbidden
    pub fn require(&self, permission: &str) -> Result<(), AppError> {
        if self.session.has_permission(permission) {
            return Ok(());
        }
        tracing::warn!(
            user_id = %self.user_id,
            company_id = %self.session.active_company_id(),
            permission = %permission,
            "Permission denied"
        );
        Err(AppError::Forbidden)
    }

    /// 要求目标公司在当前会话的数据范围内
    pub fn require_company(&self, company_id: Uuid) -> Result<(), AppError> {
        if self.session.can_access_company(company_id) {
            return Ok(());
        }
        tracing::warn!(
            user_id = %self.user_id,
            active_company_id = %self.session.active_company_id(),
            company_id = %company_id,
            "Company outside session scope"
        );
        Err(AppError::access_denied("company is outside the session scope"))
    }
}

// 实现 FromRequestParts 以便在 handler 中直接提取 AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// 从 Authorization 头提取令牌
pub fn extract_token(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(AppError::Unauthorized)
}

/// 从 Cookie 头提取刷新令牌
pub fn extract_refresh_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == REFRESH_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|v| !v.is_empty())
}

/// JWT 认证中间件 - 必须认证
pub async fn jwt_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(req.headers())?;
    let claims = state.jwt_service.validate_access_token(&token)?;
    let user_id = claims.user_id()?;

    // 授权被撤销或公司停用时令牌随即失效
    let session = state
        .context_service
        .resolve(user_id, claims.company_id)
        .await
        .map_err(|e| match e {
            AppError::AccessDenied(_) | AppError::NotFound(_) => AppError::Unauthorized,
            other => other,
        })?;

    req.extensions_mut().insert(AuthContext {
        user_id,
        claims,
        session: Arc::new(session),
    });

    Ok(next.run(req).await)
}
