//! 刷新令牌数据访问

use crate::{db::Store, error::AppError, models::auth::RefreshToken};
use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub struct AuthRepository {
    db: Store,
}

impl AuthRepository {
    pub fn new(db: Store) -> Self {
        Self { db }
    }

    /// 只保存令牌哈希，明文令牌不落存储
    pub fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub async fn store_refresh_token(&self, token: &RefreshToken) -> Result<(), AppError> {
        let mut tables = self.db.write().await;
        tables
            .refresh_tokens
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    pub async fn find_refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshToken>, AppError> {
        Ok(self.db.read().await.refresh_tokens.get(token_hash).cloned())
    }

    /// 令牌轮换：撤销旧令牌并写入新令牌。旧令牌已被撤销时返回 false，不写入
    pub async fn rotate_refresh_token(
        &self,
        old_hash: &str,
        new_token: &RefreshToken,
    ) -> Result<bool, AppError> {
        let mut tables = self.db.write().await;

        match tables.refresh_tokens.get_mut(old_hash) {
            Some(old) if old.revoked_at.is_none() => {
                old.revoked_at = Some(Utc::now());
                old.replaced_by = Some(new_token.id);
            }
            _ => return Ok(false),
        }

        tables
            .refresh_tokens
            .insert(new_token.token_hash.clone(), new_token.clone());
        Ok(true)
    }

    /// 撤销指定用户的某个刷新令牌
    pub async fn revoke_refresh_token_by_hash(
        &self,
        token_hash: &str,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        let mut tables = self.db.write().await;
        match tables.refresh_tokens.get_mut(token_hash) {
            Some(token) if token.user_id == user_id && token.revoked_at.is_none() => {
                token.revoked_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// 撤销用户所有刷新令牌，返回撤销数量
    pub async fn revoke_all_refresh_tokens(&self, user_id: Uuid) -> Result<u64, AppError> {
        let mut tables = self.db.write().await;
        let now = Utc::now();
        let mut count = 0;
        for token in tables.refresh_tokens.values_mut() {
            if token.user_id == user_id && token.revoked_at.is_none() {
                token.revoked_at = Some(now);
                count += 1;
            }
        }
        Ok(count)
    }

    /// 清理过期的刷新令牌（含已撤销的），返回删除数量
    pub async fn cleanup_expired_tokens(&self) -> Result<u64, AppError> {
        let mut tables = self.db.write().await;
        let now = Utc::now();
        let before = tables.refresh_tokens.len();
        tables.refresh_tokens.retain(|_, token| token.expires_at >= now);
        Ok((before - tables.refresh_tokens.len()) as u64)
    }
}
