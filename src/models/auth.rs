//! 认证相关模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::session::SessionContext;

/// 登录请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// 会话起始公司，缺省为用户的默认公司
    #[serde(default)]
    pub company_id: Option<Uuid>,
}

/// 登录、刷新、切换公司返回的令牌与上下文
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// 访问令牌剩余秒数
    pub expires_in: u64,
    pub expires_at: DateTime<Utc>,
    pub context: SessionContext,
}

/// 刷新令牌请求，刷新令牌也可以来自 Cookie
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// 登出请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// 切换公司请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchCompanyRequest {
    pub company_id: Uuid,
}

/// `GET /api/session/context?user=&company=`
#[derive(Debug, Clone, Deserialize)]
pub struct SessionContextQuery {
    pub user: Uuid,
    pub company: Uuid,
}

/// 已保存的刷新令牌（仅哈希）
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub id: Uuid,
    pub token_hash: String,
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub replaced_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
