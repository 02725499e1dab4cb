//! 凭据持久化

use super::ClientError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::RwLock;
use uuid::Uuid;

/// 重启后保留的内容，足以在不输入密码的情况下恢复会话
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub active_company_id: Uuid,
    pub user_id: Uuid,
}

impl StoredCredentials {
    /// 访问令牌在 `now` 时刻的剩余秒数（过期后为负）
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds()
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Result<Option<StoredCredentials>, ClientError>;
    async fn save(&self, credentials: &StoredCredentials) -> Result<(), ClientError>;
    async fn clear(&self) -> Result<(), ClientError>;
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    slot: RwLock<Option<StoredCredentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: StoredCredentials) -> Self {
        Self {
            slot: RwLock::new(Some(credentials)),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<StoredCredentials>, ClientError> {
        Ok(self.slot.read().await.clone())
    }

    async fn save(&self, credentials: &StoredCredentials) -> Result<(), ClientError> {
        *self.slot.write().await = Some(credentials.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), ClientError> {
        *self.slot.write().await = None;
        Ok(())
    }
}

/// 磁盘上的 JSON 文件
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

fn storage_error(e: impl std::fmt::Display) -> ClientError {
    ClientError::Storage(e.to_string())
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<StoredCredentials>, ClientError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error(e)),
        };

        match serde_json::from_slice(&bytes) {
            Ok(credentials) => Ok(Some(credentials)),
            Err(e) => {
                // 文件不可读时视为未登录
                tracing::warn!(path = %self.path.display(), "Discarding corrupt credential file: {}", e);
                Ok(None)
            }
        }
    }

    async fn save(&self, credentials: &StoredCredentials) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(storage_error)?;
        }
        let json = serde_json::to_vec_pretty(credentials).map_err(storage_error)?;

        // 原子替换
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await.map_err(storage_error)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(storage_error)
    }

    async fn clear(&self) -> Result<(), ClientError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> StoredCredentials {
        StoredCredentials {
            access_token: "access".to_string(),
            expires_at: Utc::now() + chrono::Duration::minutes(15),
            refresh_token: "refresh".to_string(),
            active_company_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryCredentialStore::new();
        assert!(store.load().await.unwrap().is_none());

        let creds = credentials();
        store.save(&creds).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(creds));

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_persists_and_clears() {
        let path = std::env::temp_dir()
            .join(format!("erp-context-{}", Uuid::new_v4()))
            .join("session.json");
        let store = FileCredentialStore::new(&path);

        assert!(store.load().await.unwrap().is_none());

        let creds = credentials();
        store.save(&creds).await.unwrap();
        assert_eq!(FileCredentialStore::new(&path).load().await.unwrap(), Some(creds));

        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_signed_out() {
        let path = std::env::temp_dir().join(format!("erp-context-{}.json", Uuid::new_v4()));
        tokio::fs::write(&path, b"not json").await.unwrap();

        assert!(FileCredentialStore::new(&path).load().await.unwrap().is_none());
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[test]
    fn test_remaining_secs() {
        let now = Utc::now();
        let creds = StoredCredentials {
            expires_at: now + chrono::Duration::seconds(45),
            ..credentials()
        };
        assert_eq!(creds.remaining_secs(now), 45);
    }
}
