//! User repository (用户数据访问)

use crate::{db::Store, error::AppError, models::user::User};
use chrono::{Duration, Utc};
use uuid::Uuid;

pub struct UserRepository {
    db: Store,
}

impl UserRepository {
    pub fn new(db: Store) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.db.read().await.users.get(&id).cloned())
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let tables = self.db.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    /// 新增用户，用户名必须唯一
    pub async fn insert(&self, user: User) -> Result<User, AppError> {
        let mut tables = self.db.write().await;

        if tables.users.values().any(|u| u.username == user.username) {
            return Err(AppError::Conflict(format!(
                "username '{}' already exists",
                user.username
            )));
        }

        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    /// 记录一次登录失败，达到上限后锁定账户。返回当前失败次数
    pub async fn record_failed_attempt(
        &self,
        id: Uuid,
        max_attempts: u32,
        lockout_secs: u64,
    ) -> Result<u32, AppError> {
        let mut tables = self.db.write().await;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("user"))?;

        user.failed_login_attempts += 1;
        if user.failed_login_attempts >= max_attempts {
            user.locked_until = Some(Utc::now() + Duration::seconds(lockout_secs as i64));
            tracing::warn!(
                user_id = %id,
                attempts = user.failed_login_attempts,
                "Account locked after repeated login failures"
            );
        }

        Ok(user.failed_login_attempts)
    }

    /// 重置失败次数并解除锁定
    pub async fn reset_failed_attempts(&self, id: Uuid) -> Result<(), AppError> {
        let mut tables = self.db.write().await;
        if let Some(user) = tables.users.get_mut(&id) {
            user.failed_login_attempts = 0;
            user.locked_until = None;
        }
        Ok(())
    }
}
