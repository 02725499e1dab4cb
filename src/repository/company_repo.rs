//! Company repository (公司数据访问)

use crate::{
    db::Store,
    error::AppError,
    models::company::{Company, UpdateCompanyRequest},
};
use uuid::Uuid;

pub struct CompanyRepository {
    db: Store,
}

impl CompanyRepository {
    pub fn new(db: Store) -> Self {
        Self { db }
    }

    /// 列出所有公司（插入顺序）
    pub async fn list(&self) -> Result<Vec<Company>, AppError> {
        Ok(self.db.read().await.companies.clone())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Company>, AppError> {
        let tables = self.db.read().await;
        Ok(tables.companies.iter().find(|c| c.id == id).cloned())
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<Company>, AppError> {
        let tables = self.db.read().await;
        Ok(tables.companies.iter().find(|c| c.code == code).cloned())
    }

    /// 新增公司，编码必须唯一
    pub async fn insert(&self, company: Company) -> Result<Company, AppError> {
        let mut tables = self.db.write().await;

        if tables.companies.iter().any(|c| c.code == company.code) {
            return Err(AppError::Conflict(format!(
                "company code '{}' already exists",
                company.code
            )));
        }
        if tables.companies.iter().any(|c| c.id == company.id) {
            return Err(AppError::Conflict(format!("company {} already exists", company.id)));
        }

        tables.companies.push(company.clone());
        Ok(company)
    }

    /// 更新公司基本信息
    pub async fn update(
        &self,
        id: Uuid,
        req: &UpdateCompanyRequest,
    ) -> Result<Option<Company>, AppError> {
        let mut tables = self.db.write().await;

        if let Some(code) = &req.code {
            if tables.companies.iter().any(|c| &c.code == code && c.id != id) {
                return Err(AppError::Conflict(format!("company code '{}' already exists", code)));
            }
        }

        let Some(company) = tables.companies.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };

        if let Some(name) = &req.name {
            company.name = name.clone();
        }
        if let Some(code) = &req.code {
            company.code = code.clone();
        }
        if let Some(currency) = &req.currency {
            company.currency = currency.clone();
        }
        if let Some(is_active) = req.is_active {
            company.is_active = is_active;
        }
        company.updated_at = chrono::Utc::now();

        Ok(Some(company.clone()))
    }
}
