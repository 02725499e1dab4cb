//! 会话事件总线
//! 会话变更与缓存失效通知（发布即忘，不保证订阅者之间的顺序）

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// 会话事件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    LoggedIn {
        user_id: Uuid,
        company_id: Uuid,
    },
    CompanySwitched {
        user_id: Uuid,
        from_company_id: Uuid,
        to_company_id: Uuid,
    },
    TokenRefreshed {
        user_id: Uuid,
        company_id: Uuid,
    },
    LoggedOut {
        user_id: Uuid,
    },
    /// 依赖某公司数据的缓存应标记为过期
    CacheInvalidated {
        user_id: Option<Uuid>,
        company_id: Uuid,
        reason: String,
    },
}

impl SessionEvent {
    /// 获取事件类型名称
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::LoggedIn { .. } => "logged_in",
            SessionEvent::CompanySwitched { .. } => "company_switched",
            SessionEvent::TokenRefreshed { .. } => "token_refreshed",
            SessionEvent::LoggedOut { .. } => "logged_out",
            SessionEvent::CacheInvalidated { .. } => "cache_invalidated",
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// 事件总线
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// 创建新的事件总线
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// 发布事件，返回收到事件的订阅者数量；没有订阅者不算错误
    pub fn publish(&self, event: SessionEvent) -> usize {
        let event_type = event.event_type();
        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::debug!(event_type, receivers, "Session event published");
                receivers
            }
            Err(_) => {
                tracing::trace!(event_type, "Session event dropped, no subscribers");
                0
            }
        }
    }

    /// 订阅事件
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}
