//! 固定演示数据
//! 不是数据生成器：只写入一组固定的公司、角色和用户，便于无需初始化管理员即可启动

use crate::{
    auth::password::PasswordHasher,
    config::{SecurityConfig, SeedConfig},
    db::Store,
    error::AppError,
    models::{
        company::{Company, CompanyType},
        permission::Permission,
        role::{CompanyAccess, Role},
        user::{User, UserStatus},
    },
    repository::{CompanyRepository, RoleRepository, UserRepository},
};
use chrono::Utc;
use secrecy::ExposeSecret;
use uuid::Uuid;

pub const HOLDING_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0001);
pub const SUBSIDIARY_US_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0002);
pub const BRANCH_NY_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0003);
pub const SUBSIDIARY_EU_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0004);

pub const ADMIN_USER_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0001_0001);
pub const CLERK_USER_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0001_0002);

pub const ADMIN_ROLE_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0002_0001);
pub const CONTROLLER_ROLE_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0002_0002);
pub const CLERK_ROLE_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0002_0003);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub companies: usize,
    pub roles: usize,
    pub users: usize,
}

/// 写入演示数据。存储中已有公司时不做任何修改
pub async fn seed_demo(
    db: &Store,
    seed: &SeedConfig,
    security: &SecurityConfig,
) -> Result<SeedSummary, AppError> {
    let company_repo = CompanyRepository::new(db.clone());
    if !company_repo.list().await?.is_empty() {
        tracing::info!("Store already populated, demo seed skipped");
        return Ok(SeedSummary {
            companies: 0,
            roles: 0,
            users: 0,
        });
    }

    let companies = [
        (HOLDING_ID, "Acme Holding", "ACME", CompanyType::Holding, None, "USD"),
        (SUBSIDIARY_US_ID, "Acme US", "ACME-US", CompanyType::Subsidiary, Some(HOLDING_ID), "USD"),
        (BRANCH_NY_ID, "Acme New York", "ACME-US-NY", CompanyType::Branch, Some(SUBSIDIARY_US_ID), "USD"),
        (SUBSIDIARY_EU_ID, "Acme Europe", "ACME-EU", CompanyType::Subsidiary, Some(HOLDING_ID), "EUR"),
    ];

    let now = Utc::now();
    let mut inserted: Vec<Company> = Vec::with_capacity(companies.len());
    for (id, name, code, company_type, parent_id, currency) in companies {
        let parent = parent_id.and_then(|pid| inserted.iter().find(|c| c.id == pid));
        let company = Company {
            id,
            name: name.to_string(),
            code: code.to_string(),
            company_type,
            parent_id,
            root_id: parent.map(|p| p.root_id).unwrap_or(id),
            level: parent.map(|p| p.level + 1).unwrap_or(1),
            currency: currency.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        inserted.push(company_repo.insert(company).await?);
    }

    let roles = [
        (ADMIN_ROLE_ID, "admin", "Full access", vec!["*"]),
        (
            CONTROLLER_ROLE_ID,
            "controller",
            "Group controller with consolidated reporting",
            vec!["read:*", "export:*", "consolidate:companies", "read:sessions"],
        ),
        (
            CLERK_ROLE_ID,
            "clerk",
            "Warehouse clerk",
            vec![
                "read:companies",
                "read:stock",
                "write:stock",
                "export:stock",
                "write:deliveries",
                "read:journal",
                "write:journal",
            ],
        ),
    ];

    let role_repo = RoleRepository::new(db.clone());
    for (id, name, description, permissions) in &roles {
        let permissions = permissions
            .iter()
            .map(|p| p.parse::<Permission>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Invalid seed permission: {}", e)))?;
        role_repo
            .insert(Role {
                id: *id,
                name: name.to_string(),
                description: Some(description.to_string()),
                permissions,
                is_system: true,
                created_at: now,
            })
            .await?;
    }

    let hasher = PasswordHasher::from_config(security)?;
    let password_hash = hasher.hash(seed.demo_password.expose_secret())?;

    let users = [
        (ADMIN_USER_ID, "admin", "Demo Administrator", HOLDING_ID),
        (CLERK_USER_ID, "clerk", "Demo Clerk", BRANCH_NY_ID),
    ];
    let user_repo = UserRepository::new(db.clone());
    for (id, username, display_name, default_company) in users {
        user_repo
            .insert(User {
                id,
                username: username.to_string(),
                display_name: display_name.to_string(),
                password_hash: password_hash.clone(),
                status: UserStatus::Enabled,
                default_company_id: Some(default_company),
                failed_login_attempts: 0,
                locked_until: None,
                created_at: now,
            })
            .await?;
    }

    let grants = [
        (ADMIN_USER_ID, HOLDING_ID, ADMIN_ROLE_ID),
        (ADMIN_USER_ID, SUBSIDIARY_US_ID, CONTROLLER_ROLE_ID),
        (ADMIN_USER_ID, BRANCH_NY_ID, CLERK_ROLE_ID),
        (ADMIN_USER_ID, SUBSIDIARY_EU_ID, CONTROLLER_ROLE_ID),
        (CLERK_USER_ID, BRANCH_NY_ID, CLERK_ROLE_ID),
    ];
    for (user_id, company_id, role_id) in grants {
        role_repo
            .grant_access(CompanyAccess {
                user_id,
                company_id,
                role_id,
                granted_at: now,
            })
            .await?;
    }

    let summary = SeedSummary {
        companies: inserted.len(),
        roles: roles.len(),
        users: users.len(),
    };
    tracing::info!(
        companies = summary.companies,
        roles = summary.roles,
        users = summary.users,
        "Demo data seeded"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[tokio::test]
    async fn test_seed_is_fixed_and_idempotent() {
        let config = test_config();
        let db = Store::new();

        let first = seed_demo(&db, &config.seed, &config.security).await.unwrap();
        assert_eq!(first.companies, 4);
        assert_eq!(first.users, 2);

        let second = seed_demo(&db, &config.seed, &config.security).await.unwrap();
        assert_eq!(second.companies, 0);

        let branch = CompanyRepository::new(db.clone())
            .find_by_id(BRANCH_NY_ID)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(branch.level, 3);
        assert_eq!(branch.root_id, HOLDING_ID);
    }
}
