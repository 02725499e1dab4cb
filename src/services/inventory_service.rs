//! 库存与分录服务
//! 库存调整、出库单流转，出库完成时自动生成销售成本分录

use crate::{
    db::Store,
    error::AppError,
    export,
    models::inventory::*,
    realtime::{EventBus, SessionEvent},
    repository::{InventoryRepository, PendingMovement},
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

pub const STOCK_EXPORT_HEADERS: [&str; 6] = [
    "warehouse_id",
    "location_id",
    "product_id",
    "quantity",
    "unit_cost",
    "updated_at",
];

/// 出库完成的结果
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryCompletion {
    pub delivery: Delivery,
    pub movements: Vec<StockMovement>,
    pub journal_entry: JournalEntry,
}

pub struct InventoryService {
    db: Store,
    event_bus: Arc<EventBus>,
}

impl InventoryService {
    pub fn new(db: Store, event_bus: Arc<EventBus>) -> Self {
        Self { db, event_bus }
    }

    fn repo(&self) -> InventoryRepository {
        InventoryRepository::new(self.db.clone())
    }

    /// 调整一个库存格子，结果不能为负
    pub async fn adjust_stock(
        &self,
        company_id: Uuid,
        req: AdjustStockRequest,
    ) -> Result<StockMovement, AppError> {
        if req.delta.is_zero() {
            return Err(AppError::validation("delta must not be zero"));
        }
        if req.unit_cost.is_some_and(|c| c < Decimal::ZERO) {
            return Err(AppError::validation("unit_cost must not be negative"));
        }
        if req.reference_type.trim().is_empty() {
            return Err(AppError::validation("reference_type is required"));
        }

        let pending = PendingMovement {
            key: StockKey {
                warehouse_id: req.warehouse_id,
                location_id: req.location_id,
                product_id: req.product_id,
            },
            delta: req.delta,
            unit_cost: req.unit_cost,
        };

        let movement = self
            .repo()
            .apply_movements(company_id, &[pending], &req.reference_type, req.reference_id)
            .await?
            .pop()
            .ok_or_else(|| AppError::internal_error("stock movement was not recorded"))?;

        tracing::info!(
            company_id = %company_id,
            product_id = %movement.key.product_id,
            delta = %movement.quantity_delta,
            resulting = %movement.resulting_quantity,
            "Stock adjusted"
        );

        self.invalidate(company_id, "stock_adjusted");
        Ok(movement)
    }

    pub async fn list_stock(&self, company_id: Uuid) -> Result<Vec<StockCell>, AppError> {
        self.repo().list_stock(company_id).await
    }

    pub async fn list_movements(&self, company_id: Uuid) -> Result<Vec<StockMovement>, AppError> {
        self.repo().list_movements(company_id).await
    }

    pub async fn list_journal_entries(&self, company_id: Uuid) -> Result<Vec<JournalEntry>, AppError> {
        self.repo().list_journal_entries(company_id).await
    }

    /// 创建草稿出库单
    pub async fn create_delivery(
        &self,
        company_id: Uuid,
        req: CreateDeliveryRequest,
    ) -> Result<Delivery, AppError> {
        if req.reference.trim().is_empty() {
            return Err(AppError::validation("reference is required"));
        }
        if req.lines.is_empty() {
            return Err(AppError::validation("delivery must have at least one line"));
        }
        if req.lines.iter().any(|l| l.quantity <= Decimal::ZERO) {
            return Err(AppError::validation("line quantity must be positive"));
        }
        if req.lines.iter().any(|l| l.unit_cost < Decimal::ZERO) {
            return Err(AppError::validation("line unit_cost must not be negative"));
        }

        let delivery = self
            .repo()
            .insert_delivery(Delivery {
                id: Uuid::new_v4(),
                company_id,
                warehouse_id: req.warehouse_id,
                reference: req.reference,
                status: DeliveryStatus::Draft,
                lines: req.lines,
                created_at: Utc::now(),
                completed_at: None,
            })
            .await?;

        tracing::info!(company_id = %company_id, delivery_id = %delivery.id, "Delivery created");
        Ok(delivery)
    }

    pub async fn mark_ready(&self, company_id: Uuid, id: Uuid) -> Result<Delivery, AppError> {
        self.repo()
            .transition_delivery(company_id, id, DeliveryStatus::Ready)
            .await
    }

    pub async fn cancel(&self, company_id: Uuid, id: Uuid) -> Result<Delivery, AppError> {
        self.repo()
            .transition_delivery(company_id, id, DeliveryStatus::Cancelled)
            .await
    }

    /// 完成出库：扣减库存并过账 借：销售成本 / 贷：库存
    pub async fn complete_delivery(
        &self,
        company_id: Uuid,
        id: Uuid,
    ) -> Result<DeliveryCompletion, AppError> {
        let repo = self.repo();
        let delivery = repo
            .find_delivery(id)
            .await?
            .filter(|d| d.company_id == company_id)
            .ok_or_else(|| AppError::not_found("delivery"))?;

        let total = delivery
            .total_value()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let entry = JournalEntry::new(
            company_id,
            "delivery",
            delivery.id,
            format!("Cost of goods delivered ({})", delivery.reference),
            vec![
                JournalLine::debit(COGS_ACCOUNT, total),
                JournalLine::credit(INVENTORY_ACCOUNT, total),
            ],
        )
        .map_err(|e| AppError::Validation(e.to_string()))?;

        let (delivery, movements, journal_entry) =
            repo.complete_delivery(company_id, id, entry).await?;

        tracing::info!(
            company_id = %company_id,
            delivery_id = %delivery.id,
            lines = movements.len(),
            amount = %journal_entry.total_debit(),
            "Delivery completed and posted"
        );

        self.invalidate(company_id, "delivery_completed");

        Ok(DeliveryCompletion {
            delivery,
            movements,
            journal_entry,
        })
    }

    /// 导出库存，返回 (文件名, CSV 内容)
    pub async fn export_stock_csv(&self, company_id: Uuid) -> Result<(String, String), AppError> {
        let rows = self.list_stock(company_id).await?.into_iter().map(|cell| {
            vec![
                cell.key.warehouse_id.to_string(),
                cell.key.location_id.to_string(),
                cell.key.product_id.to_string(),
                cell.quantity.to_string(),
                cell.unit_cost.to_string(),
                cell.updated_at.to_rfc3339(),
            ]
        });

        let body = export::to_csv(&STOCK_EXPORT_HEADERS, rows)?;
        Ok((export::export_filename("stock", Utc::now().date_naive()), body))
    }

    fn invalidate(&self, company_id: Uuid, reason: &str) {
        self.event_bus.publish(SessionEvent::CacheInvalidated {
            user_id: None,
            company_id,
            reason: reason.to_string(),
        });
    }
}
