//! 认证服务：登录、登出、令牌刷新、切换公司

use crate::{
    auth::{jwt::JwtService, password::PasswordHasher},
    config::SecurityConfig,
    db::Store,
    error::AppError,
    models::{auth::*, session::SessionContext, user::UserStatus},
    realtime::{EventBus, SessionEvent},
    repository::{AuthRepository, UserRepository},
    services::context_service::ContextService,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

pub struct AuthService {
    db: Store,
    jwt_service: Arc<JwtService>,
    context_service: Arc<ContextService>,
    event_bus: Arc<EventBus>,
    security: SecurityConfig,
    hasher: PasswordHasher,
}

impl AuthService {
    pub fn new(
        db: Store,
        jwt_service: Arc<JwtService>,
        context_service: Arc<ContextService>,
        event_bus: Arc<EventBus>,
        security: SecurityConfig,
    ) -> Result<Self, AppError> {
        let hasher = PasswordHasher::from_config(&security)?;
        Ok(Self {
            db,
            jwt_service,
            context_service,
            event_bus,
            security,
            hasher,
        })
    }

    /// 用户登录
    pub async fn login(&self, req: LoginRequest) -> Result<SessionResponse, AppError> {
        let user_repo = UserRepository::new(self.db.clone());

        let user = match user_repo.find_by_username(&req.username).await? {
            Some(user) => user,
            None => {
                tracing::info!(username = %req.username, "Login failed: unknown user");
                return Err(AppError::Unauthorized);
            }
        };

        // 检查账户是否被锁定
        if let Some(locked_until) = user.locked_until {
            if locked_until > Utc::now() {
                tracing::warn!(user_id = %user.id, %locked_until, "Login rejected: account locked");
                return Err(AppError::authentication("账户已被临时锁定"));
            }
        }

        // 验证密码
        if let Err(e) = self.hasher.verify(&req.password, &user.password_hash) {
            let attempts = user_repo
                .record_failed_attempt(
                    user.id,
                    self.security.max_login_attempts,
                    self.security.login_lockout_duration_secs,
                )
                .await?;
            tracing::info!(user_id = %user.id, attempts, "Login failed: wrong password");
            return Err(e);
        }

        // 检查账户状态
        if user.status == UserStatus::Disabled {
            return Err(AppError::authentication("账户已被禁用"));
        }

        if user.failed_login_attempts > 0 || user.locked_until.is_some() {
            user_repo.reset_failed_attempts(user.id).await?;
        }

        let company_id = match req.company_id {
            Some(id) => id,
            None => self.context_service.default_company_id(&user).await?,
        };
        let context = self.context_service.resolve(user.id, company_id).await?;

        let response = self.issue_session(context).await?;

        tracing::info!(user_id = %user.id, company_id = %company_id, "User logged in");
        self.event_bus.publish(SessionEvent::LoggedIn {
            user_id: user.id,
            company_id,
        });

        Ok(response)
    }

    /// 刷新令牌（轮换），并为令牌所属公司重新解析上下文
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<SessionResponse, AppError> {
        let claims = self.jwt_service.validate_refresh_token(refresh_token)?;

        let auth_repo = AuthRepository::new(self.db.clone());
        let token_hash = AuthRepository::hash_token(refresh_token);
        let record = auth_repo
            .find_refresh_token_by_hash(&token_hash)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if record.revoked_at.is_some() {
            // 已轮换的令牌再次出现，视为泄露，撤销该用户全部会话
            let revoked = auth_repo.revoke_all_refresh_tokens(record.user_id).await?;
            tracing::warn!(
                user_id = %record.user_id,
                revoked,
                "Revoked refresh token reused, all sessions revoked"
            );
            return Err(AppError::Unauthorized);
        }

        if record.expires_at < Utc::now() || claims.user_id()? != record.user_id {
            return Err(AppError::Unauthorized);
        }

        let context = self
            .context_service
            .resolve(record.user_id, record.company_id)
            .await?;

        let (response, new_record) = self.sign_session(context)?;
        if !auth_repo.rotate_refresh_token(&token_hash, &new_record).await? {
            // 并发刷新中另一方已完成轮换
            return Err(AppError::Unauthorized);
        }

        self.event_bus.publish(SessionEvent::TokenRefreshed {
            user_id: record.user_id,
            company_id: record.company_id,
        });

        Ok(response)
    }

    /// 切换当前公司。新上下文解析失败时不做任何修改
    pub async fn switch_company(
        &self,
        user_id: Uuid,
        from_company_id: Uuid,
        req: SwitchCompanyRequest,
        current_refresh_token: Option<&str>,
    ) -> Result<SessionResponse, AppError> {
        let context = self.context_service.resolve(user_id, req.company_id).await?;

        let response = self.issue_session(context).await?;

        // 旧公司绑定的刷新令牌不再需要
        if let Some(token) = current_refresh_token {
            AuthRepository::new(self.db.clone())
                .revoke_refresh_token_by_hash(&AuthRepository::hash_token(token), user_id)
                .await?;
        }

        tracing::info!(
            user_id = %user_id,
            from_company_id = %from_company_id,
            to_company_id = %req.company_id,
            "Company switched"
        );

        self.event_bus.publish(SessionEvent::CompanySwitched {
            user_id,
            from_company_id,
            to_company_id: req.company_id,
        });
        for company_id in [from_company_id, req.company_id] {
            self.event_bus.publish(SessionEvent::CacheInvalidated {
                user_id: Some(user_id),
                company_id,
                reason: "company_switch".to_string(),
            });
        }

        Ok(response)
    }

    /// 当前会话上下文
    pub async fn me(&self, user_id: Uuid, company_id: Uuid) -> Result<SessionContext, AppError> {
        self.context_service.resolve(user_id, company_id).await
    }

    /// 登出（撤销刷新令牌）
    pub async fn logout(&self, refresh_token: Option<&str>, user_id: Uuid) -> Result<(), AppError> {
        if let Some(token) = refresh_token {
            AuthRepository::new(self.db.clone())
                .revoke_refresh_token_by_hash(&AuthRepository::hash_token(token), user_id)
                .await?;
        }

        self.event_bus.publish(SessionEvent::LoggedOut { user_id });
        Ok(())
    }

    /// 从所有设备登出
    pub async fn logout_all(&self, user_id: Uuid) -> Result<u64, AppError> {
        let revoked = AuthRepository::new(self.db.clone())
            .revoke_all_refresh_tokens(user_id)
            .await?;
        self.event_bus.publish(SessionEvent::LoggedOut { user_id });
        Ok(revoked)
    }

    /// 删除过期的刷新令牌
    pub async fn cleanup_expired_tokens(&self) -> Result<u64, AppError> {
        let removed = AuthRepository::new(self.db.clone())
            .cleanup_expired_tokens()
            .await?;
        if removed > 0 {
            tracing::debug!(removed, "Expired refresh tokens removed");
        }
        Ok(removed)
    }

    async fn issue_session(&self, context: SessionContext) -> Result<SessionResponse, AppError> {
        let (response, record) = self.sign_session(context)?;
        AuthRepository::new(self.db.clone())
            .store_refresh_token(&record)
            .await?;
        Ok(response)
    }

    /// 签发令牌对，返回响应和待保存的刷新令牌记录
    fn sign_session(&self, context: SessionContext) -> Result<(SessionResponse, RefreshToken), AppError> {
        let company_id = context.active_company_id();
        let access = self
            .jwt_service
            .generate_access_token(&context.user_id, &context.username, company_id)?;
        let refresh = self
            .jwt_service
            .generate_refresh_token(&context.user_id, &context.username, company_id)?;

        let record = RefreshToken {
            id: Uuid::new_v4(),
            token_hash: AuthRepository::hash_token(&refresh.token),
            user_id: context.user_id,
            company_id,
            expires_at: refresh.expires_at,
            revoked_at: None,
            replaced_by: None,
            created_at: Utc::now(),
        };

        let response = SessionResponse {
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.access_token_exp_secs(),
            expires_at: access.expires_at,
            context,
        };

        Ok((response, record))
    }
}
