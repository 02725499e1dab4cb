//! 库存、出库单与分录的 HTTP 处理器
//! 路径中的公司必须在当前会话的数据范围内

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    handlers::company::csv_response,
    middleware::AppState,
    models::inventory::{AdjustStockRequest, CreateDeliveryRequest},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// 列出库存
pub async fn list_stock(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(company_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    auth_context.require("read:stock")?;
    auth_context.require_company(company_id)?;

    let stock = state.inventory_service.list_stock(company_id).await?;
    Ok(Json(json!({
        "stock": stock,
        "count": stock.len(),
    })))
}

/// 调整库存
pub async fn adjust_stock(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(company_id): Path<Uuid>,
    Json(req): Json<AdjustStockRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_context.require("write:stock")?;
    auth_context.require_company(company_id)?;

    let movement = state.inventory_service.adjust_stock(company_id, req).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

/// 库存流水
pub async fn list_movements(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(company_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    auth_context.require("read:stock")?;
    auth_context.require_company(company_id)?;

    let movements = state.inventory_service.list_movements(company_id).await?;
    Ok(Json(json!({
        "movements": movements,
        "count": movements.len(),
    })))
}

/// 导出库存 (CSV)
pub async fn export_stock(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(company_id): Path<Uuid>,
) -> Result<Response, AppError> {
    auth_context.require("export:stock")?;
    auth_context.require_company(company_id)?;

    let (filename, body) = state.inventory_service.export_stock_csv(company_id).await?;
    csv_response(&filename, body)
}

/// 创建出库单
pub async fn create_delivery(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(company_id): Path<Uuid>,
    Json(req): Json<CreateDeliveryRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_context.require("write:deliveries")?;
    auth_context.require_company(company_id)?;

    let delivery = state.inventory_service.create_delivery(company_id, req).await?;
    Ok((StatusCode::CREATED, Json(delivery)))
}

/// 出库单就绪
pub async fn mark_delivery_ready(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path((company_id, delivery_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    auth_context.require("write:deliveries")?;
    auth_context.require_company(company_id)?;

    Ok(Json(state.inventory_service.mark_ready(company_id, delivery_id).await?))
}

/// 取消出库单
pub async fn cancel_delivery(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path((company_id, delivery_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    auth_context.require("write:deliveries")?;
    auth_context.require_company(company_id)?;

    Ok(Json(state.inventory_service.cancel(company_id, delivery_id).await?))
}

/// 完成出库并过账
pub async fn complete_delivery(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path((company_id, delivery_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    auth_context.require("write:deliveries")?;
    auth_context.require("write:journal")?;
    auth_context.require_company(company_id)?;

    let completion = state
        .inventory_service
        .complete_delivery(company_id, delivery_id)
        .await?;
    Ok(Json(completion))
}

/// 会计分录
pub async fn list_journal_entries(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(company_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    auth_context.require("read:journal")?;
    auth_context.require_company(company_id)?;

    let entries = state.inventory_service.list_journal_entries(company_id).await?;
    Ok(Json(json!({
        "entries": entries,
        "count": entries.len(),
    })))
}
