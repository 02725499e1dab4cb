//! 公司管理服务
//! 公司的创建与编辑、按会话范围列出、层级树和 CSV 导出

use crate::{
    db::Store,
    error::AppError,
    export,
    models::{
        company::{Company, CompanyHierarchyNode, CreateCompanyRequest, UpdateCompanyRequest},
        session::SessionContext,
    },
    realtime::{EventBus, SessionEvent},
    repository::CompanyRepository,
    services::hierarchy::CompanyHierarchy,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// 公司导出的列
pub const COMPANY_EXPORT_HEADERS: [&str; 7] =
    ["code", "name", "type", "level", "parent_code", "currency", "active"];

pub struct CompanyService {
    db: Store,
    event_bus: Arc<EventBus>,
}

impl CompanyService {
    pub fn new(db: Store, event_bus: Arc<EventBus>) -> Self {
        Self { db, event_bus }
    }

    /// 创建公司，层级和根公司由上级计算
    pub async fn create(&self, req: CreateCompanyRequest) -> Result<Company, AppError> {
        req.validate()?;

        let repo = CompanyRepository::new(self.db.clone());
        let id = Uuid::new_v4();

        let (level, root_id) = match req.parent_id {
            Some(parent_id) => {
                let parent = repo.find_by_id(parent_id).await?.ok_or_else(|| {
                    AppError::Validation(format!("parent company {} does not exist", parent_id))
                })?;
                (parent.level + 1, parent.root_id)
            }
            None => (1, id),
        };

        let now = Utc::now();
        let company = repo
            .insert(Company {
                id,
                name: req.name,
                code: req.code,
                company_type: req.company_type,
                parent_id: req.parent_id,
                root_id,
                level,
                currency: req.currency.to_uppercase(),
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!(
            company_id = %company.id,
            code = %company.code,
            level = company.level,
            "Company created"
        );

        // 上级的子公司列表变化，依赖它的会话需要刷新
        if let Some(parent_id) = company.parent_id {
            self.event_bus.publish(SessionEvent::CacheInvalidated {
                user_id: None,
                company_id: parent_id,
                reason: "company_created".to_string(),
            });
        }

        Ok(company)
    }

    pub async fn get(&self, id: Uuid) -> Result<Company, AppError> {
        CompanyRepository::new(self.db.clone())
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("company"))
    }

    /// 更新公司基本信息（不支持变更上级）
    pub async fn update(&self, id: Uuid, mut req: UpdateCompanyRequest) -> Result<Company, AppError> {
        req.validate()?;
        req.currency = req.currency.map(|c| c.to_uppercase());

        let company = CompanyRepository::new(self.db.clone())
            .update(id, &req)
            .await?
            .ok_or_else(|| AppError::not_found("company"))?;

        tracing::info!(company_id = %id, is_active = company.is_active, "Company updated");

        self.event_bus.publish(SessionEvent::CacheInvalidated {
            user_id: None,
            company_id: id,
            reason: "company_updated".to_string(),
        });

        Ok(company)
    }

    /// 当前会话数据范围内的公司（保持插入顺序）
    pub async fn list_scoped(&self, session: &SessionContext) -> Result<Vec<Company>, AppError> {
        let companies = CompanyRepository::new(self.db.clone()).list().await?;
        Ok(companies
            .into_iter()
            .filter(|c| session.can_access_company(c.id))
            .collect())
    }

    /// 数据范围内的层级树：从范围内最高的上级开始，只保留范围内的公司
    pub async fn hierarchy(&self, session: &SessionContext) -> Result<CompanyHierarchyNode, AppError> {
        let companies = CompanyRepository::new(self.db.clone()).list().await?;
        let hierarchy = CompanyHierarchy::build(companies);

        let active_id = session.active_company_id();
        let top = hierarchy
            .ancestor_ids(active_id)
            .into_iter()
            .take_while(|id| session.can_access_company(*id))
            .last()
            .unwrap_or(active_id);

        let mut tree = hierarchy
            .subtree(top)
            .ok_or_else(|| AppError::not_found("company"))?;
        tree.prune(&|id: Uuid| session.can_access_company(id));
        Ok(tree)
    }

    /// 导出当前数据范围内的公司，返回 (文件名, CSV 内容)
    pub async fn export_csv(&self, session: &SessionContext) -> Result<(String, String), AppError> {
        let all = CompanyRepository::new(self.db.clone()).list().await?;
        let code_of = |id: Option<Uuid>| {
            id.and_then(|id| all.iter().find(|c| c.id == id))
                .map(|c| c.code.clone())
                .unwrap_or_default()
        };

        let rows: Vec<Vec<String>> = all
            .iter()
            .filter(|c| session.can_access_company(c.id))
            .map(|c| {
                vec![
                    c.code.clone(),
                    c.name.clone(),
                    c.company_type.as_str().to_string(),
                    c.level.to_string(),
                    code_of(c.parent_id),
                    c.currency.clone(),
                    c.is_active.to_string(),
                ]
            })
            .collect();

        let body = export::to_csv(&COMPANY_EXPORT_HEADERS, rows)?;
        Ok((export::export_filename("companies", Utc::now().date_naive()), body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::company::CompanyType;

    fn service() -> CompanyService {
        CompanyService::new(Store::new(), Arc::new(EventBus::new(16)))
    }

    fn request(code: &str, company_type: CompanyType, parent_id: Option<Uuid>) -> CreateCompanyRequest {
        CreateCompanyRequest {
            name: format!("{} Ltd", code),
            code: code.to_string(),
            company_type,
            parent_id,
            currency: "usd".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_computes_level_and_root() {
        let svc = service();
        let h = svc.create(request("HOLD", CompanyType::Holding, None)).await.unwrap();
        let s = svc
            .create(request("SUB", CompanyType::Subsidiary, Some(h.id)))
            .await
            .unwrap();
        let b = svc
            .create(request("BR", CompanyType::Branch, Some(s.id)))
            .await
            .unwrap();

        assert_eq!((h.level, h.root_id), (1, h.id));
        assert_eq!((s.level, s.root_id), (2, h.id));
        assert_eq!((b.level, b.root_id), (3, h.id));
        assert_eq!(b.currency, "USD");
    }

    #[tokio::test]
    async fn test_create_rejects_missing_parent_and_duplicate_code() {
        let svc = service();
        let err = svc
            .create(request("SUB", CompanyType::Subsidiary, Some(Uuid::new_v4())))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        svc.create(request("HOLD", CompanyType::Holding, None)).await.unwrap();
        let err = svc
            .create(request("HOLD", CompanyType::Holding, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_unknown_company() {
        let err = service()
            .update(Uuid::new_v4(), UpdateCompanyRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
