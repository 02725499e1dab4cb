//! 角色管理服务

use crate::{
    db::Store,
    error::AppError,
    models::{
        permission::PermissionSet,
        role::{CreateRoleRequest, Role},
    },
    repository::RoleRepository,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

pub struct RoleService {
    db: Store,
}

impl RoleService {
    pub fn new(db: Store) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<Role>, AppError> {
        RoleRepository::new(self.db.clone()).list().await
    }

    /// 创建角色，权限字符串格式错误时整体拒绝
    pub async fn create(&self, req: CreateRoleRequest) -> Result<Role, AppError> {
        req.validate()?;

        let permissions = PermissionSet::parse(&req.permissions)
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let role = RoleRepository::new(self.db.clone())
            .insert(Role {
                id: Uuid::new_v4(),
                name: req.name,
                description: req.description,
                permissions: permissions.iter().cloned().collect(),
                is_system: false,
                created_at: Utc::now(),
            })
            .await?;

        tracing::info!(role_id = %role.id, name = %role.name, "Role created");
        Ok(role)
    }
}
