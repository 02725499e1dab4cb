//! Inventory and ledger repository (库存与分录数据访问)

use crate::{
    db::{Store, Tables},
    error::AppError,
    models::inventory::*,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

/// 待应用的库存变动
#[derive(Debug, Clone)]
pub struct PendingMovement {
    pub key: StockKey,
    pub delta: Decimal,
    pub unit_cost: Option<Decimal>,
}

pub struct InventoryRepository {
    db: Store,
}

impl InventoryRepository {
    pub fn new(db: Store) -> Self {
        Self { db }
    }

    pub async fn list_stock(&self, company_id: Uuid) -> Result<Vec<StockCell>, AppError> {
        let tables = self.db.read().await;
        Ok(tables
            .stock
            .iter()
            .filter(|((cid, _), _)| *cid == company_id)
            .map(|(_, cell)| cell.clone())
            .collect())
    }

    pub async fn list_movements(&self, company_id: Uuid) -> Result<Vec<StockMovement>, AppError> {
        let tables = self.db.read().await;
        Ok(tables
            .movements
            .iter()
            .filter(|m| m.company_id == company_id)
            .cloned()
            .collect())
    }

    /// 应用一组库存变动（全部成功或全部不生效）
    pub async fn apply_movements(
        &self,
        company_id: Uuid,
        pending: &[PendingMovement],
        reference_type: &str,
        reference_id: Uuid,
    ) -> Result<Vec<StockMovement>, AppError> {
        let mut tables = self.db.write().await;
        apply_in_place(&mut tables, company_id, pending, reference_type, reference_id, Utc::now())
    }

    // ==================== Deliveries ====================

    pub async fn insert_delivery(&self, delivery: Delivery) -> Result<Delivery, AppError> {
        let mut tables = self.db.write().await;
        tables.deliveries.insert(delivery.id, delivery.clone());
        Ok(delivery)
    }

    pub async fn find_delivery(&self, id: Uuid) -> Result<Option<Delivery>, AppError> {
        Ok(self.db.read().await.deliveries.get(&id).cloned())
    }

    /// 状态迁移（不涉及库存），状态不匹配时返回 Conflict
    pub async fn transition_delivery(
        &self,
        company_id: Uuid,
        id: Uuid,
        next: DeliveryStatus,
    ) -> Result<Delivery, AppError> {
        let mut tables = self.db.write().await;
        let delivery = find_delivery_mut(&mut tables, company_id, id)?;
        check_transition(delivery, next)?;
        delivery.status = next;
        Ok(delivery.clone())
    }

    /// 完成出库：扣减库存、记录库存流水、过账分录、更新状态，在同一把写锁内完成
    pub async fn complete_delivery(
        &self,
        company_id: Uuid,
        id: Uuid,
        entry: JournalEntry,
    ) -> Result<(Delivery, Vec<StockMovement>, JournalEntry), AppError> {
        let mut tables = self.db.write().await;
        let now = Utc::now();

        let delivery = find_delivery_mut(&mut tables, company_id, id)?;
        check_transition(delivery, DeliveryStatus::Done)?;

        let warehouse_id = delivery.warehouse_id;
        let pending: Vec<PendingMovement> = delivery
            .lines
            .iter()
            .map(|line| PendingMovement {
                key: StockKey {
                    warehouse_id,
                    location_id: line.location_id,
                    product_id: line.product_id,
                },
                delta: -line.quantity,
                unit_cost: None,
            })
            .collect();

        let movements = apply_in_place(&mut tables, company_id, &pending, "delivery", id, now)?;

        let delivery = find_delivery_mut(&mut tables, company_id, id)?;
        delivery.status = DeliveryStatus::Done;
        delivery.completed_at = Some(now);
        let delivery = delivery.clone();

        tables.journal.push(entry.clone());

        Ok((delivery, movements, entry))
    }

    // ==================== Journal ====================

    pub async fn list_journal_entries(&self, company_id: Uuid) -> Result<Vec<JournalEntry>, AppError> {
        let tables = self.db.read().await;
        Ok(tables
            .journal
            .iter()
            .filter(|e| e.company_id == company_id)
            .cloned()
            .collect())
    }
}

fn find_delivery_mut(
    tables: &mut Tables,
    company_id: Uuid,
    id: Uuid,
) -> Result<&mut Delivery, AppError> {
    tables
        .deliveries
        .get_mut(&id)
        .filter(|d| d.company_id == company_id)
        .ok_or_else(|| AppError::not_found("delivery"))
}

fn check_transition(delivery: &Delivery, next: DeliveryStatus) -> Result<(), AppError> {
    if !delivery.status.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "delivery {} cannot move from {} to {}",
            delivery.id,
            delivery.status.as_str(),
            next.as_str()
        )));
    }
    Ok(())
}

/// 先整体校验再落地，任一格子会变为负数时不做任何修改
fn apply_in_place(
    tables: &mut Tables,
    company_id: Uuid,
    pending: &[PendingMovement],
    reference_type: &str,
    reference_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<StockMovement>, AppError> {
    let mut projected: HashMap<StockKey, Decimal> = HashMap::new();
    let mut resulting = Vec::with_capacity(pending.len());
    for p in pending {
        let current = projected.get(&p.key).copied().unwrap_or_else(|| {
            tables
                .stock
                .get(&(company_id, p.key))
                .map(|c| c.quantity)
                .unwrap_or(Decimal::ZERO)
        });
        let next = current.checked_add(p.delta).ok_or_else(|| {
            AppError::Validation(format!(
                "stock quantity for product {} at location {} is out of range",
                p.key.product_id, p.key.location_id
            ))
        })?;
        if next < Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "insufficient stock for product {} at location {}: have {}, need {}",
                p.key.product_id, p.key.location_id, current, -p.delta
            )));
        }
        projected.insert(p.key, next);
        resulting.push(next);
    }

    let mut movements = Vec::with_capacity(pending.len());
    for (p, quantity) in pending.iter().zip(resulting) {
        let cell = tables
            .stock
            .entry((company_id, p.key))
            .or_insert_with(|| StockCell {
                company_id,
                key: p.key,
                quantity: Decimal::ZERO,
                unit_cost: Decimal::ZERO,
                updated_at: now,
            });
        cell.quantity = quantity;
        if let Some(cost) = p.unit_cost {
            cell.unit_cost = cost;
        }
        cell.updated_at = now;

        let movement = StockMovement {
            id: Uuid::new_v4(),
            company_id,
            key: p.key,
            quantity_delta: p.delta,
            resulting_quantity: cell.quantity,
            reference_type: reference_type.to_string(),
            reference_id,
            created_at: now,
        };
        tables.movements.push(movement.clone());
        movements.push(movement);
    }

    Ok(movements)
}
