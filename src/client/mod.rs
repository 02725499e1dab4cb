//! 客户端会话
//!
//! [`AuthSession`] 是前端驱动的状态机：登录、保持令牌有效、切换当前公司，
//! 数据范围变化时把缓存查询标记为过期。通过 [`AuthBackend`] 访问服务端
//! （进程内 [`LocalBackend`] 或 HTTP [`HttpBackend`]），凭据由
//! [`CredentialStore`] 持久化。

pub mod backend;
pub mod cache;
pub mod session;
pub mod storage;

pub use backend::{AuthBackend, HttpBackend, LocalBackend};
pub use cache::{CachedQuery, QueryCache};
pub use session::{AuthSession, SessionState};
pub use storage::{CredentialStore, FileCredentialStore, MemoryCredentialStore, StoredCredentials};

use crate::error::AppError;
use thiserror::Error;

/// 客户端错误，每个变体都可直接展示给用户
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// 服务端拒绝了请求
    #[error("{0}")]
    Rejected(String),

    #[error("not signed in")]
    NotAuthenticated,

    #[error("already signed in")]
    AlreadyAuthenticated,

    #[error("session expired, please sign in again")]
    SessionExpired,

    #[error("company is not available for this user")]
    CompanyNotAllowed,

    #[error("server unreachable: {0}")]
    Transport(String),

    #[error("unexpected server response: {0}")]
    Decode(String),

    #[error("credential storage error: {0}")]
    Storage(String),
}

impl From<AppError> for ClientError {
    fn from(err: AppError) -> Self {
        ClientError::Rejected(err.user_message())
    }
}
