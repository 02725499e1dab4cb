//! 客户端查询缓存
//!
//! 每条缓存记录所属公司。切换公司时全部标记为过期，服务端失效通知只标记
//! 对应公司的记录。过期记录在重新获取前仍可读取。

use crate::realtime::SessionEvent;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct CachedQuery {
    pub company_id: Uuid,
    pub value: Value,
    pub fetched_at: DateTime<Utc>,
    pub stale: bool,
}

#[derive(Default)]
pub struct QueryCache {
    entries: RwLock<HashMap<String, CachedQuery>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, key: impl Into<String>, company_id: Uuid, value: Value) {
        self.entries.write().await.insert(
            key.into(),
            CachedQuery {
                company_id,
                value,
                fetched_at: Utc::now(),
                stale: false,
            },
        );
    }

    pub async fn get(&self, key: &str) -> Option<CachedQuery> {
        self.entries.read().await.get(key).cloned()
    }

    /// 只返回未过期的值
    pub async fn get_fresh(&self, key: &str) -> Option<Value> {
        self.entries
            .read()
            .await
            .get(key)
            .filter(|q| !q.stale)
            .map(|q| q.value.clone())
    }

    /// 返回新标记为过期的条数
    pub async fn mark_all_stale(&self) -> usize {
        let mut entries = self.entries.write().await;
        let mut marked = 0;
        for entry in entries.values_mut().filter(|q| !q.stale) {
            entry.stale = true;
            marked += 1;
        }
        marked
    }

    pub async fn mark_company_stale(&self, company_id: Uuid) -> usize {
        let mut entries = self.entries.write().await;
        let mut marked = 0;
        for entry in entries
            .values_mut()
            .filter(|q| q.company_id == company_id && !q.stale)
        {
            entry.stale = true;
            marked += 1;
        }
        marked
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// 持续处理失效通知，直到通道关闭
    pub fn listen(self: &Arc<Self>, mut rx: broadcast::Receiver<SessionEvent>) -> JoinHandle<()> {
        let cache = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let event = match rx.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // 漏收通知，缓存全部不可信
                        tracing::warn!(skipped, "Invalidation listener lagged");
                        match cache.upgrade() {
                            Some(cache) => {
                                cache.mark_all_stale().await;
                                continue;
                            }
                            None => break,
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                let Some(cache) = cache.upgrade() else { break };
                if let SessionEvent::CacheInvalidated { company_id, reason, .. } = event {
                    let marked = cache.mark_company_stale(company_id).await;
                    tracing::debug!(%company_id, %reason, marked, "Cached queries marked stale");
                }
            }
        })
    }
}
