//! 用户管理的 HTTP 处理器

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::{role::GrantCompanyAccessRequest, user::*},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// 创建用户
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_context.require("write:users")?;

    let user = state.user_service.create_user(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "用户创建成功",
            "user": UserResponse::from(&user)
        })),
    ))
}

/// 授予用户在某公司的角色
pub async fn grant_company_access(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(user_id): Path<Uuid>,
    Json(req): Json<GrantCompanyAccessRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_context.require("write:users")?;
    // 只能授予自己数据范围内的公司
    auth_context.require_company(req.company_id)?;

    let access = state
        .user_service
        .grant_company_access(user_id, req, &auth_context.session.permissions)
        .await?;
    Ok((StatusCode::CREATED, Json(access)))
}
