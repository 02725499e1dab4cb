//! Role repository (角色与公司授权数据访问)

use crate::{
    db::Store,
    error::AppError,
    models::role::{CompanyAccess, Role},
};
use uuid::Uuid;

pub struct RoleRepository {
    db: Store,
}

impl RoleRepository {
    pub fn new(db: Store) -> Self {
        Self { db }
    }

    // ==================== Roles ====================

    /// 列出所有角色
    pub async fn list(&self) -> Result<Vec<Role>, AppError> {
        let mut roles = self.db.read().await.roles.clone();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    /// 根据 ID 查找角色
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Role>, AppError> {
        let tables = self.db.read().await;
        Ok(tables.roles.iter().find(|r| r.id == id).cloned())
    }

    /// 根据名称查找角色
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Role>, AppError> {
        let tables = self.db.read().await;
        Ok(tables.roles.iter().find(|r| r.name == name).cloned())
    }

    /// 创建角色
    pub async fn insert(&self, role: Role) -> Result<Role, AppError> {
        let mut tables = self.db.write().await;
        if tables.roles.iter().any(|r| r.name == role.name) {
            return Err(AppError::Conflict(format!("role '{}' already exists", role.name)));
        }
        tables.roles.push(role.clone());
        Ok(role)
    }

    // ==================== Company access ====================

    /// 授予用户在某公司的角色；同一公司已有授权时替换
    pub async fn grant_access(&self, access: CompanyAccess) -> Result<CompanyAccess, AppError> {
        let mut tables = self.db.write().await;

        if let Some(existing) = tables
            .company_access
            .iter_mut()
            .find(|a| a.user_id == access.user_id && a.company_id == access.company_id)
        {
            *existing = access.clone();
        } else {
            tables.company_access.push(access.clone());
        }

        Ok(access)
    }

    /// 用户的全部公司授权（授予顺序）
    pub async fn list_access_for_user(&self, user_id: Uuid) -> Result<Vec<CompanyAccess>, AppError> {
        let tables = self.db.read().await;
        Ok(tables
            .company_access
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }
}
