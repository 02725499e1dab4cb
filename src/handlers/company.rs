//! 公司管理的 HTTP 处理器

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::company::{CreateCompanyRequest, UpdateCompanyRequest},
};
use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// 列出当前会话范围内的公司
pub async fn list_companies(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    auth_context.require("read:companies")?;

    let companies = state.company_service.list_scoped(&auth_context.session).await?;

    Ok(Json(json!({
        "companies": companies,
        "count": companies.len(),
    })))
}

/// 创建公司
pub async fn create_company(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Json(req): Json<CreateCompanyRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_context.require("write:companies")?;

    // 只能在自己的数据范围内挂子公司
    if let Some(parent_id) = req.parent_id {
        auth_context.require_company(parent_id)?;
    }

    let company = state.company_service.create(req).await?;
    Ok((StatusCode::CREATED, Json(company)))
}

/// 获取公司详情
pub async fn get_company(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    auth_context.require("read:companies")?;
    auth_context.require_company(id)?;

    Ok(Json(state.company_service.get(id).await?))
}

/// 更新公司
pub async fn update_company(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCompanyRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_context.require("write:companies")?;
    auth_context.require_company(id)?;

    Ok(Json(state.company_service.update(id, req).await?))
}

/// 当前公司所在的层级树
pub async fn get_hierarchy(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    auth_context.require("read:companies")?;

    Ok(Json(state.company_service.hierarchy(&auth_context.session).await?))
}

/// 导出公司列表 (CSV)
pub async fn export_companies(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<Response, AppError> {
    auth_context.require("export:companies")?;

    let (filename, body) = state.company_service.export_csv(&auth_context.session).await?;
    csv_response(&filename, body)
}

/// CSV 下载响应
pub(crate) fn csv_response(filename: &str, body: String) -> Result<Response, AppError> {
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .map_err(|e| AppError::Internal(format!("Invalid export filename: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
