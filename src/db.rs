//! 内存数据存储
//! 原型阶段的数据层：所有表都放在一把读写锁之后，写锁即事务边界

use crate::models::{
    auth::RefreshToken,
    company::Company,
    inventory::{Delivery, JournalEntry, StockCell, StockKey, StockMovement},
    role::{CompanyAccess, Role},
    user::User,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// 所有表
#[derive(Debug, Default)]
pub struct Tables {
    /// 按插入顺序保存，层级构建依赖该顺序
    pub companies: Vec<Company>,
    pub users: HashMap<Uuid, User>,
    pub roles: Vec<Role>,
    pub company_access: Vec<CompanyAccess>,
    /// 以令牌哈希为键
    pub refresh_tokens: HashMap<String, RefreshToken>,
    pub stock: BTreeMap<(Uuid, StockKey), StockCell>,
    pub movements: Vec<StockMovement>,
    pub deliveries: HashMap<Uuid, Delivery>,
    pub journal: Vec<JournalEntry>,
}

/// 共享存储句柄，Clone 只复制 Arc
#[derive(Clone, Default)]
pub struct Store {
    tables: Arc<RwLock<Tables>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().await
    }

    /// 存储健康检查
    pub async fn health_check(&self) -> HealthStatus {
        let tables = self.tables.read().await;
        tracing::debug!(companies = tables.companies.len(), "Store health check: OK");
        HealthStatus::Healthy {
            companies: tables.companies.len(),
            users: tables.users.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy { companies: usize, users: usize },
}
