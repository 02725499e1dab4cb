//! 客户端认证会话状态机
//!
//! ```text
//! Anonymous -> Authenticating -> Authenticated -> Refreshing -> Authenticated
//!     ^              |                 |               |
//!     +--- failure --+                 |               +-> Expired -> Anonymous
//!     +--------------- logout ---------+
//! ```
//!
//! 令牌与上下文在同一把写锁内一起替换，读取方不会看到 A 公司的令牌配上
//! B 公司的上下文。刷新与切换公司在整个过程中持有 `op_lock`，互不交错。

use super::{
    backend::AuthBackend,
    cache::QueryCache,
    storage::{CredentialStore, StoredCredentials},
    ClientError,
};
use crate::{
    config::SessionConfig,
    models::{
        auth::{LoginRequest, SessionResponse},
        session::SessionContext,
    },
    realtime::{EventBus, SessionEvent},
};
use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Anonymous,
    Authenticating,
    Authenticated,
    Refreshing,
    Expired,
}

#[derive(Debug)]
struct Inner {
    state: SessionState,
    credentials: Option<StoredCredentials>,
    context: Option<SessionContext>,
    last_error: Option<String>,
}

pub struct AuthSession {
    backend: Arc<dyn AuthBackend>,
    store: Arc<dyn CredentialStore>,
    cache: Arc<QueryCache>,
    events: EventBus,
    inner: RwLock<Inner>,
    state_tx: watch::Sender<SessionState>,
    op_lock: Mutex<()>,
    refresh_threshold: chrono::Duration,
    check_interval: Duration,
}

impl AuthSession {
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        store: Arc<dyn CredentialStore>,
        config: &SessionConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Anonymous);
        Self {
            backend,
            store,
            cache: Arc::new(QueryCache::new()),
            events: EventBus::new(config.event_bus_capacity),
            inner: RwLock::new(Inner {
                state: SessionState::Anonymous,
                credentials: None,
                context: None,
                last_error: None,
            }),
            state_tx,
            op_lock: Mutex::new(()),
            refresh_threshold: chrono::Duration::seconds(config.refresh_threshold_secs as i64),
            check_interval: Duration::from_secs(config.expiry_check_interval_secs.max(1)),
        }
    }

    // ==================== Accessors ====================

    pub async fn state(&self) -> SessionState {
        self.inner.read().await.state
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub async fn context(&self) -> Option<SessionContext> {
        self.inner.read().await.context.clone()
    }

    pub async fn active_company_id(&self) -> Option<Uuid> {
        self.inner
            .read()
            .await
            .context
            .as_ref()
            .map(|c| c.active_company_id())
    }

    pub async fn access_token(&self) -> Option<String> {
        self.inner
            .read()
            .await
            .credentials
            .as_ref()
            .map(|c| c.access_token.clone())
    }

    pub async fn credentials(&self) -> Option<StoredCredentials> {
        self.inner.read().await.credentials.clone()
    }

    /// 最近一次失败的消息，下次登录成功后清除
    pub async fn last_error(&self) -> Option<String> {
        self.inner.read().await.last_error.clone()
    }

    pub async fn has_permission(&self, permission: &str) -> bool {
        self.inner
            .read()
            .await
            .context
            .as_ref()
            .is_some_and(|c| c.has_permission(permission))
    }

    pub fn cache(&self) -> Arc<QueryCache> {
        self.cache.clone()
    }

    /// 会话变化与缓存失效通知
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    // ==================== Transitions ====================

    pub async fn login(
        &self,
        username: &str,
        password: &str,
        company_id: Option<Uuid>,
    ) -> Result<SessionContext, ClientError> {
        let _op = self.op_lock.lock().await;

        {
            let mut inner = self.inner.write().await;
            match inner.state {
                SessionState::Anonymous | SessionState::Expired => {}
                _ => return Err(ClientError::AlreadyAuthenticated),
            }
            inner.last_error = None;
            self.set_state(&mut inner, SessionState::Authenticating);
        }

        let result = self
            .backend
            .login(LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
                company_id,
            })
            .await;

        match result {
            Ok(response) => {
                let context = self.install(response).await;
                tracing::info!(
                    user_id = %context.user_id,
                    company_id = %context.active_company_id(),
                    "Signed in"
                );
                self.events.publish(SessionEvent::LoggedIn {
                    user_id: context.user_id,
                    company_id: context.active_company_id(),
                });
                Ok(context)
            }
            Err(err) => {
                let mut inner = self.inner.write().await;
                inner.last_error = Some(err.to_string());
                self.set_state(&mut inner, SessionState::Anonymous);
                tracing::info!(username, error = %err, "Sign-in failed");
                Err(err)
            }
        }
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        let _op = self.op_lock.lock().await;

        let (credentials, user_id) = {
            let mut inner = self.inner.write().await;
            let credentials = inner.credentials.take();
            let user_id = inner.context.take().map(|c| c.user_id);
            self.set_state(&mut inner, SessionState::Anonymous);
            (credentials, user_id)
        };

        if let Some(creds) = &credentials {
            // 服务端不可达时仍在本地登出
            if let Err(e) = self.backend.logout(&creds.access_token, &creds.refresh_token).await {
                tracing::warn!(error = %e, "Server-side logout failed");
            }
        }

        self.cache.clear().await;
        let cleared = self.store.clear().await;

        if let Some(user_id) = user_id {
            self.events.publish(SessionEvent::LoggedOut { user_id });
        }
        cleared
    }

    /// 轮换令牌对，任何失败都会结束会话
    pub async fn refresh_token(&self) -> Result<SessionContext, ClientError> {
        let _op = self.op_lock.lock().await;
        self.refresh_locked().await
    }

    /// 访问令牌剩余有效期低于阈值时刷新，返回是否发生了刷新
    pub async fn check_expiry(&self) -> Result<bool, ClientError> {
        let _op = self.op_lock.lock().await;

        let due = {
            let inner = self.inner.read().await;
            match (&inner.state, &inner.credentials) {
                (SessionState::Authenticated, Some(creds)) => {
                    creds.expires_at - Utc::now() < self.refresh_threshold
                }
                _ => false,
            }
        };

        if !due {
            return Ok(false);
        }

        tracing::debug!("Access token close to expiry, refreshing");
        self.refresh_locked().await.map(|_| true)
    }

    /// 切换当前公司，被拒绝时令牌、上下文和缓存保持不变
    pub async fn switch_company(&self, company_id: Uuid) -> Result<SessionContext, ClientError> {
        let _op = self.op_lock.lock().await;

        let (credentials, current) = {
            let inner = self.inner.read().await;
            match (&inner.state, &inner.credentials, &inner.context) {
                (SessionState::Authenticated, Some(creds), Some(ctx)) => (creds.clone(), ctx.clone()),
                _ => return Err(ClientError::NotAuthenticated),
            }
        };

        let from_company_id = current.active_company_id();
        if from_company_id == company_id {
            return Ok(current);
        }
        if !current.is_allowed_company(company_id) {
            self.record_error(&ClientError::CompanyNotAllowed).await;
            return Err(ClientError::CompanyNotAllowed);
        }

        let response = match self
            .backend
            .switch_company(&credentials.access_token, &credentials.refresh_token, company_id)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                self.record_error(&err).await;
                return Err(err);
            }
        };

        let context = self.install(response).await;

        let marked = self.cache.mark_all_stale().await;
        tracing::info!(
            from_company_id = %from_company_id,
            to_company_id = %company_id,
            stale_queries = marked,
            "Company switched"
        );

        self.events.publish(SessionEvent::CompanySwitched {
            user_id: context.user_id,
            from_company_id,
            to_company_id: company_id,
        });
        self.events.publish(SessionEvent::CacheInvalidated {
            user_id: Some(context.user_id),
            company_id: from_company_id,
            reason: "company_switch".to_string(),
        });

        Ok(context)
    }

    /// 从凭据存储恢复会话，没有可用凭据时返回 `None`
    pub async fn restore(&self) -> Result<Option<SessionContext>, ClientError> {
        let _op = self.op_lock.lock().await;

        let Some(stored) = self.store.load().await? else {
            return Ok(None);
        };

        {
            let mut inner = self.inner.write().await;
            inner.credentials = Some(stored.clone());
            self.set_state(&mut inner, SessionState::Authenticating);
        }

        // 访问令牌已过期，直接刷新
        let restored = if stored.expires_at <= Utc::now() {
            match self.backend.refresh(&stored.refresh_token).await {
                Ok(response) => Ok(self.install(response).await),
                Err(err) => Err(err),
            }
        } else {
            match self.backend.me(&stored.access_token).await {
                Ok(context) => {
                    let mut inner = self.inner.write().await;
                    inner.context = Some(context.clone());
                    inner.last_error = None;
                    self.set_state(&mut inner, SessionState::Authenticated);
                    Ok(context)
                }
                Err(err) => Err(err),
            }
        };

        match restored {
            Ok(context) => Ok(Some(context)),
            Err(err) => {
                tracing::info!(error = %err, "Stored session could not be restored");
                {
                    let mut inner = self.inner.write().await;
                    inner.credentials = None;
                    inner.context = None;
                    inner.last_error = Some(err.to_string());
                    self.set_state(&mut inner, SessionState::Anonymous);
                }
                self.store.clear().await?;
                Ok(None)
            }
        }
    }

    /// 定期在过期前刷新，会话被释放后任务结束
    pub fn spawn_expiry_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let session: Weak<Self> = Arc::downgrade(self);
        let period = self.check_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(session) = session.upgrade() else { break };
                if let Err(e) = session.check_expiry().await {
                    tracing::info!(error = %e, "Proactive refresh failed");
                }
            }
        })
    }

    // ==================== Internals ====================

    async fn refresh_locked(&self) -> Result<SessionContext, ClientError> {
        let refresh_token = {
            let mut inner = self.inner.write().await;
            let token = match (&inner.state, &inner.credentials) {
                (SessionState::Authenticated, Some(creds)) => creds.refresh_token.clone(),
                _ => return Err(ClientError::NotAuthenticated),
            };
            self.set_state(&mut inner, SessionState::Refreshing);
            token
        };

        match self.backend.refresh(&refresh_token).await {
            Ok(response) => {
                let context = self.install(response).await;
                self.events.publish(SessionEvent::TokenRefreshed {
                    user_id: context.user_id,
                    company_id: context.active_company_id(),
                });
                Ok(context)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Token refresh failed, session expired");
                self.expire().await;
                Err(ClientError::SessionExpired)
            }
        }
    }

    async fn expire(&self) {
        let user_id = {
            let mut inner = self.inner.write().await;
            self.set_state(&mut inner, SessionState::Expired);
            inner.credentials = None;
            inner.last_error = Some(ClientError::SessionExpired.to_string());
            inner.context.take().map(|c| c.user_id)
        };

        self.cache.clear().await;
        if let Err(e) = self.store.clear().await {
            tracing::warn!(error = %e, "Failed to clear stored credentials");
        }

        {
            let mut inner = self.inner.write().await;
            self.set_state(&mut inner, SessionState::Anonymous);
        }

        if let Some(user_id) = user_id {
            self.events.publish(SessionEvent::LoggedOut { user_id });
        }
    }

    /// 同时替换令牌与上下文，然后持久化
    async fn install(&self, response: SessionResponse) -> SessionContext {
        let credentials = StoredCredentials {
            access_token: response.access_token,
            expires_at: response.expires_at,
            refresh_token: response.refresh_token,
            active_company_id: response.context.active_company_id(),
            user_id: response.context.user_id,
        };
        let context = response.context;

        {
            let mut inner = self.inner.write().await;
            inner.credentials = Some(credentials.clone());
            inner.context = Some(context.clone());
            inner.last_error = None;
            self.set_state(&mut inner, SessionState::Authenticated);
        }

        if let Err(e) = self.store.save(&credentials).await {
            tracing::warn!(error = %e, "Failed to persist credentials");
        }

        context
    }

    async fn record_error(&self, err: &ClientError) {
        self.inner.write().await.last_error = Some(err.to_string());
    }

    fn set_state(&self, inner: &mut Inner, next: SessionState) {
        if inner.state != next {
            tracing::debug!(from = ?inner.state, to = ?next, "Session state changed");
        }
        inner.state = next;
        self.state_tx.send_replace(next);
    }
}
