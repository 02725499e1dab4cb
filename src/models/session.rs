//! 解析后的会话上下文

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::company::{CompanyRef, CompanyType};
use super::permission::PermissionSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRef {
    pub id: Uuid,
    pub name: String,
}

/// “用户 U 以公司 C 的身份操作”时界面需要的全部信息
///
/// 按 (用户, 当前公司) 推导，创建后不再修改；切换公司或刷新令牌会生成新值。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub user_id: Uuid,
    pub username: String,
    pub active_company: CompanyRef,
    /// 用户持有授权的公司
    pub user_companies: Vec<CompanyRef>,
    pub role: RoleRef,
    pub permissions: PermissionSet,
    pub company_level: CompanyType,
    /// 会话的数据范围，总是包含当前公司
    pub accessible_company_ids: BTreeSet<Uuid>,
    pub can_consolidate: bool,
    pub parent_company: Option<CompanyRef>,
    pub child_companies: Vec<CompanyRef>,
    /// 由近到远，直到根
    pub ancestor_ids: Vec<Uuid>,
}

impl SessionContext {
    pub fn active_company_id(&self) -> Uuid {
        self.active_company.id
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.has_permission(permission)
    }

    pub fn can_access_company(&self, company_id: Uuid) -> bool {
        self.accessible_company_ids.contains(&company_id)
    }

    pub fn is_allowed_company(&self, company_id: Uuid) -> bool {
        self.user_companies.iter().any(|c| c.id == company_id)
    }
}
