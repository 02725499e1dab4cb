//! 角色与公司授权模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::permission::{Permission, PermissionSet};

/// 角色
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<Permission>,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
}

impl Role {
    pub fn permission_set(&self) -> PermissionSet {
        PermissionSet::new(self.permissions.iter().cloned())
    }
}

/// 用户在某公司的角色授权（用户 <-> 公司 <-> 角色）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyAccess {
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub role_id: Uuid,
    pub granted_at: DateTime<Utc>,
}

/// 创建角色请求
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    pub description: Option<String>,
    /// 原始权限字符串，格式错误时拒绝
    #[validate(length(min = 1))]
    pub permissions: Vec<String>,
}

/// 公司授权请求
#[derive(Debug, Deserialize)]
pub struct GrantCompanyAccessRequest {
    pub company_id: Uuid,
    pub role_id: Uuid,
}
