//! 角色管理的 HTTP 处理器

use crate::{
    auth::middleware::AuthContext, error::AppError, middleware::AppState,
    models::role::CreateRoleRequest,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

/// 列出角色
pub async fn list_roles(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    auth_context.require("read:roles")?;

    let roles = state.role_service.list().await?;
    Ok(Json(json!({
        "roles": roles,
        "count": roles.len(),
    })))
}

/// 创建角色
pub async fn create_role(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Json(req): Json<CreateRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_context.require("write:roles")?;

    let role = state.role_service.create(req).await?;
    Ok((StatusCode::CREATED, Json(role)))
}
