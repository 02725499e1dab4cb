//! 库存与分录模型

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// 出库过账使用的默认科目
pub const COGS_ACCOUNT: &str = "5000-COGS";
pub const INVENTORY_ACCOUNT: &str = "1300-INVENTORY";

/// 库存格子的 (仓库, 库位, 产品) 键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub warehouse_id: Uuid,
    pub location_id: Uuid,
    pub product_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockCell {
    pub company_id: Uuid,
    #[serde(flatten)]
    pub key: StockKey,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// 每次库存变动都会留下一条流水
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: Uuid,
    pub company_id: Uuid,
    #[serde(flatten)]
    pub key: StockKey,
    pub quantity_delta: Decimal,
    pub resulting_quantity: Decimal,
    pub reference_type: String,
    pub reference_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdjustStockRequest {
    pub warehouse_id: Uuid,
    pub location_id: Uuid,
    pub product_id: Uuid,
    /// 有符号
    pub delta: Decimal,
    pub unit_cost: Option<Decimal>,
    pub reference_type: String,
    pub reference_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Draft,
    Ready,
    Done,
    Cancelled,
}

impl DeliveryStatus {
    pub fn can_transition_to(self, next: DeliveryStatus) -> bool {
        use DeliveryStatus::*;
        matches!(
            (self, next),
            (Draft, Ready) | (Draft, Cancelled) | (Ready, Done) | (Ready, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Draft => "draft",
            DeliveryStatus::Ready => "ready",
            DeliveryStatus::Done => "done",
            DeliveryStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryLine {
    pub location_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    /// 销售成本过账使用的单位成本
    pub unit_cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub company_id: Uuid,
    pub warehouse_id: Uuid,
    pub reference: String,
    pub status: DeliveryStatus,
    pub lines: Vec<DeliveryLine>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Delivery {
    /// 各行 数量 × 单位成本 之和
    pub fn total_value(&self) -> Result<Decimal, JournalError> {
        self.lines.iter().try_fold(Decimal::ZERO, |acc, l| {
            l.quantity
                .checked_mul(l.unit_cost)
                .and_then(|value| acc.checked_add(value))
                .ok_or(JournalError::Overflow)
        })
    }
}

fn checked_sum(mut amounts: impl Iterator<Item = Decimal>) -> Result<Decimal, JournalError> {
    amounts.try_fold(Decimal::ZERO, |acc, amount| {
        acc.checked_add(amount).ok_or(JournalError::Overflow)
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDeliveryRequest {
    pub warehouse_id: Uuid,
    pub reference: String,
    pub lines: Vec<DeliveryLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalLine {
    pub account: String,
    pub debit: Decimal,
    pub credit: Decimal,
}

impl JournalLine {
    pub fn debit(account: &str, amount: Decimal) -> Self {
        Self {
            account: account.to_string(),
            debit: amount,
            credit: Decimal::ZERO,
        }
    }

    pub fn credit(account: &str, amount: Decimal) -> Self {
        Self {
            account: account.to_string(),
            debit: Decimal::ZERO,
            credit: amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JournalError {
    #[error("journal entry has no lines")]
    Empty,
    #[error("journal line for {0} has a negative amount")]
    NegativeAmount(String),
    #[error("journal entry is unbalanced: debit {debit} != credit {credit}")]
    Unbalanced { debit: Decimal, credit: Decimal },
    #[error("amount is out of range")]
    Overflow,
}

/// 复式记账分录，只能以借贷平衡的形式构造
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub company_id: Uuid,
    pub reference_type: String,
    pub reference_id: Uuid,
    pub memo: String,
    lines: Vec<JournalLine>,
    pub posted_at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn new(
        company_id: Uuid,
        reference_type: &str,
        reference_id: Uuid,
        memo: String,
        lines: Vec<JournalLine>,
    ) -> Result<Self, JournalError> {
        if lines.is_empty() {
            return Err(JournalError::Empty);
        }
        if let Some(line) = lines
            .iter()
            .find(|l| l.debit.is_sign_negative() || l.credit.is_sign_negative())
        {
            return Err(JournalError::NegativeAmount(line.account.clone()));
        }

        let debit = checked_sum(lines.iter().map(|l| l.debit))?;
        let credit = checked_sum(lines.iter().map(|l| l.credit))?;
        if debit != credit {
            return Err(JournalError::Unbalanced { debit, credit });
        }

        Ok(Self {
            id: Uuid::new_v4(),
            company_id,
            reference_type: reference_type.to_string(),
            reference_id,
            memo,
            lines,
            posted_at: Utc::now(),
        })
    }

    pub fn lines(&self) -> &[JournalLine] {
        &self.lines
    }

    // 构造时已校验合计不溢出
    pub fn total_debit(&self) -> Decimal {
        checked_sum(self.lines.iter().map(|l| l.debit)).unwrap_or(Decimal::MAX)
    }

    pub fn total_credit(&self) -> Decimal {
        checked_sum(self.lines.iter().map(|l| l.credit)).unwrap_or(Decimal::MAX)
    }
}
