//! 公司领域模型

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// 公司代码为简短的大写标识，例如 `ACME-EU`
pub static COMPANY_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9][A-Z0-9_-]{1,15}$").expect("valid company code regex"));

/// 公司在集团中的层级类型，管理范围依次缩小
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanyType {
    Holding,
    Subsidiary,
    Branch,
    Division,
}

impl CompanyType {
    /// 控股公司与子公司可以合并下级数据
    pub fn supports_consolidation(self) -> bool {
        matches!(self, CompanyType::Holding | CompanyType::Subsidiary)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompanyType::Holding => "holding",
            CompanyType::Subsidiary => "subsidiary",
            CompanyType::Branch => "branch",
            CompanyType::Division => "division",
        }
    }
}

/// 公司
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub company_type: CompanyType,
    /// `None` 表示森林中的根
    pub parent_id: Option<Uuid>,
    pub root_id: Uuid,
    /// 根为 1，下级为父级 + 1
    pub level: u32,
    pub currency: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// 公司树的递归视图，每次请求重新构建
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyHierarchyNode {
    pub company: Company,
    pub children: Vec<CompanyHierarchyNode>,
}

impl CompanyHierarchyNode {
    /// 子树中的公司数量（含自身）
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(|c| c.size()).sum::<usize>()
    }

    /// 移除 `keep` 不接受的子节点及其子树，节点本身保留
    pub fn prune(&mut self, keep: &impl Fn(Uuid) -> bool) {
        self.children.retain(|child| keep(child.company.id));
        for child in &mut self.children {
            child.prune(keep);
        }
    }

    /// 深度优先顺序的 (父, 子) id 对
    pub fn edges(&self) -> Vec<(Uuid, Uuid)> {
        let mut edges = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            for child in node.children.iter().rev() {
                edges.push((node.company.id, child.company.id));
                stack.push(child);
            }
        }
        edges
    }
}

/// 会话上下文中使用的轻量引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRef {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub company_type: CompanyType,
    pub level: u32,
}

impl From<&Company> for CompanyRef {
    fn from(company: &Company) -> Self {
        Self {
            id: company.id,
            name: company.name.clone(),
            code: company.code.clone(),
            company_type: company.company_type,
            level: company.level,
        }
    }
}

/// 创建公司请求
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCompanyRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(regex(path = *COMPANY_CODE_RE, message = "code must be 2-16 upper-case letters, digits, '-' or '_'"))]
    pub code: String,
    pub company_type: CompanyType,
    pub parent_id: Option<Uuid>,
    #[validate(length(equal = 3))]
    pub currency: String,
}

/// 更新公司请求，不支持调整上级
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateCompanyRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(regex(path = *COMPANY_CODE_RE))]
    pub code: Option<String>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub is_active: Option<bool>,
}
