//! 会话上下文解析服务
//! 根据 (用户, 当前公司) 计算权限集合、数据可见范围和合并报表资格

use crate::{
    db::Store,
    error::AppError,
    models::{
        company::{Company, CompanyRef},
        permission::{Permission, PermissionSet},
        role::{CompanyAccess, Role},
        session::{RoleRef, SessionContext},
        user::{User, UserStatus},
    },
    repository::{CompanyRepository, RoleRepository, UserRepository},
    services::hierarchy::{AccessPolicy, CompanyHierarchy},
};
use once_cell::sync::Lazy;
use uuid::Uuid;

/// 合并报表所需的显式权限
pub static CONSOLIDATE_PERMISSION: Lazy<Permission> = Lazy::new(|| Permission::Grant {
    action: "consolidate".to_string(),
    resource: crate::models::permission::ResourceScope::Named("companies".to_string()),
});

/// 合并资格：控股或子公司、确有下级、且角色显式授予合并权限
pub fn can_consolidate(company: &Company, has_children: bool, permissions: &PermissionSet) -> bool {
    company.company_type.supports_consolidation()
        && has_children
        && permissions.allows(&CONSOLIDATE_PERMISSION)
}

/// 纯函数形式的上下文解析，输入全部显式传入
pub fn resolve_session_context(
    user: &User,
    grants: &[CompanyAccess],
    roles: &[Role],
    hierarchy: &CompanyHierarchy,
    company_id: Uuid,
    policy: AccessPolicy,
) -> Result<SessionContext, AppError> {
    if user.status != UserStatus::Enabled {
        return Err(AppError::access_denied("user is disabled"));
    }

    // 先校验授权再查公司是否存在，避免泄露公司 ID
    let grant = grants
        .iter()
        .find(|g| g.user_id == user.id && g.company_id == company_id)
        .ok_or_else(|| {
            tracing::warn!(
                user_id = %user.id,
                company_id = %company_id,
                "Company not in user's allowed set"
            );
            AppError::access_denied("company is not in the user's allowed set")
        })?;

    let active = hierarchy
        .get(company_id)
        .ok_or_else(|| AppError::not_found("company"))?;
    if !active.is_active {
        return Err(AppError::access_denied("company is inactive"));
    }

    let role = roles
        .iter()
        .find(|r| r.id == grant.role_id)
        .ok_or_else(|| AppError::internal_error("role referenced by company grant is missing"))?;
    let permissions = role.permission_set();

    let children = hierarchy.children_of(company_id);
    let consolidating = can_consolidate(active, !children.is_empty(), &permissions);

    let user_companies = grants
        .iter()
        .filter(|g| g.user_id == user.id)
        .filter_map(|g| hierarchy.get(g.company_id))
        .filter(|c| c.is_active)
        .map(CompanyRef::from)
        .collect();

    Ok(SessionContext {
        user_id: user.id,
        username: user.username.clone(),
        active_company: CompanyRef::from(active),
        user_companies,
        role: RoleRef {
            id: role.id,
            name: role.name.clone(),
        },
        permissions,
        company_level: active.company_type,
        accessible_company_ids: hierarchy.accessible_company_ids(company_id, consolidating, policy),
        can_consolidate: consolidating,
        parent_company: hierarchy.parent_of(company_id).map(CompanyRef::from),
        child_companies: children.into_iter().map(CompanyRef::from).collect(),
        ancestor_ids: hierarchy.ancestor_ids(company_id),
    })
}

pub struct ContextService {
    db: Store,
    policy: AccessPolicy,
}

impl ContextService {
    pub fn new(db: Store, policy: AccessPolicy) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> AccessPolicy {
        self.policy
    }

    /// 解析会话上下文。公司不在用户授权范围内时拒绝，不做回退
    pub async fn resolve(&self, user_id: Uuid, company_id: Uuid) -> Result<SessionContext, AppError> {
        let user = UserRepository::new(self.db.clone())
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        let role_repo = RoleRepository::new(self.db.clone());
        let grants = role_repo.list_access_for_user(user_id).await?;
        let roles = role_repo.list().await?;
        let hierarchy = self.hierarchy().await?;

        let context =
            resolve_session_context(&user, &grants, &roles, &hierarchy, company_id, self.policy)?;

        tracing::debug!(
            user_id = %user_id,
            company_id = %company_id,
            can_consolidate = context.can_consolidate,
            accessible = context.accessible_company_ids.len(),
            "Session context resolved"
        );

        Ok(context)
    }

    /// 用户登录时的默认公司：优先 default_company_id，否则第一条授权
    pub async fn default_company_id(&self, user: &User) -> Result<Uuid, AppError> {
        let grants = RoleRepository::new(self.db.clone())
            .list_access_for_user(user.id)
            .await?;

        if let Some(default) = user.default_company_id {
            if grants.iter().any(|g| g.company_id == default) {
                return Ok(default);
            }
        }

        grants
            .first()
            .map(|g| g.company_id)
            .ok_or_else(|| AppError::access_denied("user has no company access"))
    }

    /// 当前公司列表构建的层级
    pub async fn hierarchy(&self) -> Result<CompanyHierarchy, AppError> {
        let companies = CompanyRepository::new(self.db.clone()).list().await?;
        Ok(CompanyHierarchy::build(companies))
    }
}
