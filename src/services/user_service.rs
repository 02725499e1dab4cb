//! 用户与公司授权管理

use crate::{
    auth::password::PasswordHasher,
    config::SecurityConfig,
    db::Store,
    error::AppError,
    models::{
        permission::PermissionSet,
        role::{CompanyAccess, GrantCompanyAccessRequest},
        user::{CreateUserRequest, User, UserStatus},
    },
    realtime::{EventBus, SessionEvent},
    repository::{CompanyRepository, RoleRepository, UserRepository},
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

pub struct UserService {
    db: Store,
    event_bus: Arc<EventBus>,
    security: SecurityConfig,
    hasher: PasswordHasher,
}

impl UserService {
    pub fn new(db: Store, event_bus: Arc<EventBus>, security: SecurityConfig) -> Result<Self, AppError> {
        let hasher = PasswordHasher::from_config(&security)?;
        Ok(Self {
            db,
            event_bus,
            security,
            hasher,
        })
    }

    /// 创建用户
    pub async fn create_user(&self, req: CreateUserRequest) -> Result<User, AppError> {
        req.validate()?;

        // 验证密码策略
        PasswordHasher::validate_password_policy(&req.password, &self.security)?;

        if let Some(company_id) = req.default_company_id {
            CompanyRepository::new(self.db.clone())
                .find_by_id(company_id)
                .await?
                .ok_or_else(|| AppError::Validation("default company does not exist".to_string()))?;
        }

        let password_hash = self.hasher.hash(&req.password)?;

        let user = UserRepository::new(self.db.clone())
            .insert(User {
                id: Uuid::new_v4(),
                username: req.username,
                display_name: req.display_name,
                password_hash,
                status: UserStatus::Enabled,
                default_company_id: req.default_company_id,
                failed_login_attempts: 0,
                locked_until: None,
                created_at: Utc::now(),
            })
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User created");
        Ok(user)
    }

    /// 授予用户在某公司的角色（已有授权时替换角色）
    /// 角色的权限必须全部被授权人当前持有的权限覆盖
    pub async fn grant_company_access(
        &self,
        user_id: Uuid,
        req: GrantCompanyAccessRequest,
        granter: &PermissionSet,
    ) -> Result<CompanyAccess, AppError> {
        UserRepository::new(self.db.clone())
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("user"))?;

        let company = CompanyRepository::new(self.db.clone())
            .find_by_id(req.company_id)
            .await?
            .ok_or_else(|| AppError::Validation("company does not exist".to_string()))?;

        let role_repo = RoleRepository::new(self.db.clone());
        let role = role_repo
            .find_by_id(req.role_id)
            .await?
            .ok_or_else(|| AppError::Validation("role does not exist".to_string()))?;

        if !granter.covers(&role.permission_set()) {
            tracing::warn!(
                user_id = %user_id,
                company_id = %company.id,
                role = %role.name,
                "Grant rejected: role exceeds granter permissions"
            );
            return Err(AppError::Forbidden);
        }

        let access = role_repo
            .grant_access(CompanyAccess {
                user_id,
                company_id: company.id,
                role_id: req.role_id,
                granted_at: Utc::now(),
            })
            .await?;

        tracing::info!(
            user_id = %user_id,
            company_id = %company.id,
            role_id = %req.role_id,
            "Company access granted"
        );

        self.event_bus.publish(SessionEvent::CacheInvalidated {
            user_id: Some(user_id),
            company_id: company.id,
            reason: "access_granted".to_string(),
        });

        Ok(access)
    }
}
