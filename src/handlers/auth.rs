//! 认证相关的 HTTP 处理器

use crate::{
    auth::middleware::{extract_refresh_cookie, AuthContext, REFRESH_COOKIE},
    error::AppError,
    middleware::AppState,
    models::auth::*,
};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;

/// 登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state.auth_service.login(req).await?;
    let cookie = refresh_cookie(&state, &response.refresh_token)?;

    Ok(([(header::SET_COOKIE, cookie)], Json(response)))
}

/// 刷新令牌。请求体中的令牌优先，否则读取 Cookie
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let req: RefreshTokenRequest = optional_json(&body)?;
    let token = req
        .refresh_token
        .or_else(|| extract_refresh_cookie(&headers))
        .ok_or(AppError::Unauthorized)?;

    let response = state.auth_service.refresh_token(&token).await?;
    let cookie = refresh_cookie(&state, &response.refresh_token)?;

    Ok(([(header::SET_COOKIE, cookie)], Json(response)))
}

/// 登出
pub async fn logout(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let req: LogoutRequest = optional_json(&body)?;
    let token = req.refresh_token.or_else(|| extract_refresh_cookie(&headers));

    state
        .auth_service
        .logout(token.as_deref(), auth_context.user_id)
        .await?;

    Ok((
        [(header::SET_COOKIE, clear_refresh_cookie(&state))],
        Json(json!({"message": "已成功登出"})),
    ))
}

/// 从所有设备登出
pub async fn logout_all(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    let revoked = state.auth_service.logout_all(auth_context.user_id).await?;

    Ok((
        [(header::SET_COOKIE, clear_refresh_cookie(&state))],
        Json(json!({
            "message": format!("已从 {} 个设备登出", revoked),
            "revoked": revoked,
        })),
    ))
}

/// 切换当前公司
pub async fn switch_company(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    headers: HeaderMap,
    Json(req): Json<SwitchCompanyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let current_refresh = extract_refresh_cookie(&headers);

    let response = state
        .auth_service
        .switch_company(
            auth_context.user_id,
            auth_context.claims.company_id,
            req,
            current_refresh.as_deref(),
        )
        .await?;
    let cookie = refresh_cookie(&state, &response.refresh_token)?;

    Ok(([(header::SET_COOKIE, cookie)], Json(response)))
}

/// 当前会话上下文
pub async fn get_current_user(auth_context: AuthContext) -> Result<impl IntoResponse, AppError> {
    Ok(Json(auth_context.session.as_ref().clone()))
}

/// 空请求体视为默认值
fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))
}

fn refresh_cookie(state: &AppState, token: &str) -> Result<HeaderValue, AppError> {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/api; Max-Age={}",
        REFRESH_COOKIE, token, state.config.security.refresh_token_exp_secs
    );
    if state.config.security.secure_cookies {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|e| AppError::Internal(format!("Invalid cookie value: {}", e)))
}

fn clear_refresh_cookie(state: &AppState) -> HeaderValue {
    let secure = if state.config.security.secure_cookies { "; Secure" } else { "" };
    HeaderValue::from_str(&format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/api; Max-Age=0{}",
        REFRESH_COOKIE, secure
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("refresh_token=; Max-Age=0"))
}
