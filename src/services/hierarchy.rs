//! 公司层级解析
//!
//! 由扁平列表构建公司森林，并计算当前公司的数据范围。上级不在列表中的孤儿
//! 公司视为根。上级链成环的公司永远到不了根，它们及其下级都不进入森林。

use crate::config::HierarchyConfig;
use crate::models::company::{Company, CompanyHierarchyNode};
use std::collections::{BTreeSet, HashMap, HashSet};
use uuid::Uuid;

/// 合并视图会话的数据范围
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    /// 合并时加入当前公司的上级链
    pub include_ancestors: bool,
}

impl From<&HierarchyConfig> for AccessPolicy {
    fn from(config: &HierarchyConfig) -> Self {
        Self {
            include_ancestors: config.include_ancestors,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompanyHierarchy {
    companies: Vec<Company>,
    index: HashMap<Uuid, usize>,
    /// 上级 id -> 子公司位置，按插入顺序
    children: HashMap<Uuid, Vec<usize>>,
    roots: Vec<usize>,
    excluded: BTreeSet<Uuid>,
}

impl CompanyHierarchy {
    pub fn build(companies: Vec<Company>) -> Self {
        let mut index = HashMap::with_capacity(companies.len());
        let mut unique = Vec::with_capacity(companies.len());
        for company in companies {
            if index.contains_key(&company.id) {
                tracing::warn!(company_id = %company.id, "Duplicate company id ignored");
                continue;
            }
            index.insert(company.id, unique.len());
            unique.push(company);
        }
        let companies = unique;

        let mut children: HashMap<Uuid, Vec<usize>> = HashMap::new();
        let mut roots = Vec::new();
        for (pos, company) in companies.iter().enumerate() {
            match company.parent_id {
                None => roots.push(pos),
                Some(parent) if index.contains_key(&parent) => {
                    children.entry(parent).or_default().push(pos)
                }
                Some(parent) => {
                    tracing::debug!(
                        company_id = %company.id,
                        parent_id = %parent,
                        "Orphaned company treated as root"
                    );
                    roots.push(pos);
                }
            }
        }

        let mut reachable: HashSet<Uuid> = HashSet::with_capacity(companies.len());
        let mut stack: Vec<usize> = roots.iter().rev().copied().collect();
        while let Some(pos) = stack.pop() {
            let id = companies[pos].id;
            if !reachable.insert(id) {
                continue;
            }
            if let Some(kids) = children.get(&id) {
                stack.extend(kids.iter().rev());
            }
        }

        let excluded: BTreeSet<Uuid> = companies
            .iter()
            .map(|c| c.id)
            .filter(|id| !reachable.contains(id))
            .collect();
        if !excluded.is_empty() {
            tracing::warn!(
                excluded = excluded.len(),
                "Cyclic company parent links detected, affected companies excluded"
            );
        }

        Self {
            companies,
            index,
            children,
            roots,
            excluded,
        }
    }

    pub fn len(&self) -> usize {
        self.companies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Company> {
        self.index.get(&id).map(|&pos| &self.companies[pos])
    }

    pub fn is_excluded(&self, id: Uuid) -> bool {
        self.excluded.contains(&id)
    }

    /// 因上级链到不了根而被排除的公司
    pub fn excluded_ids(&self) -> &BTreeSet<Uuid> {
        &self.excluded
    }

    pub fn roots(&self) -> impl Iterator<Item = &Company> {
        self.roots.iter().map(|&pos| &self.companies[pos])
    }

    /// 整个森林，根与子节点均按插入顺序
    pub fn forest(&self) -> Vec<CompanyHierarchyNode> {
        let mut visited = HashSet::new();
        self.roots
            .iter()
            .filter_map(|&pos| self.assemble(pos, &mut visited))
            .collect()
    }

    /// 以 `id` 为根的子树
    pub fn subtree(&self, id: Uuid) -> Option<CompanyHierarchyNode> {
        if self.is_excluded(id) {
            return None;
        }
        let pos = *self.index.get(&id)?;
        self.assemble(pos, &mut HashSet::new())
    }

    fn assemble(&self, pos: usize, visited: &mut HashSet<Uuid>) -> Option<CompanyHierarchyNode> {
        let company = &self.companies[pos];
        if !visited.insert(company.id) {
            return None;
        }
        let children = self
            .children
            .get(&company.id)
            .map(|kids| {
                kids.iter()
                    .filter_map(|&child| self.assemble(child, visited))
                    .collect()
            })
            .unwrap_or_default();

        Some(CompanyHierarchyNode {
            company: company.clone(),
            children,
        })
    }

    pub fn parent_of(&self, id: Uuid) -> Option<&Company> {
        if self.is_excluded(id) {
            return None;
        }
        self.get(id)?.parent_id.and_then(|parent| self.get(parent))
    }

    pub fn children_of(&self, id: Uuid) -> Vec<&Company> {
        if self.is_excluded(id) {
            return Vec::new();
        }
        self.children
            .get(&id)
            .map(|kids| kids.iter().map(|&pos| &self.companies[pos]).collect())
            .unwrap_or_default()
    }

    /// 上级链，由近到远；根、孤儿和被排除的公司为空
    pub fn ancestor_ids(&self, id: Uuid) -> Vec<Uuid> {
        if self.is_excluded(id) {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = self.get(id).and_then(|c| c.parent_id);
        while let Some(parent) = current {
            let Some(company) = self.get(parent) else {
                break;
            };
            if !seen.insert(parent) {
                break;
            }
            out.push(parent);
            current = company.parent_id;
        }
        out
    }

    /// 深度优先先序的全部下级，不含 `id`
    pub fn descendant_ids(&self, id: Uuid) -> Vec<Uuid> {
        if self.is_excluded(id) {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut stack: Vec<usize> = self
            .children
            .get(&id)
            .map(|kids| kids.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(pos) = stack.pop() {
            let child = self.companies[pos].id;
            if !seen.insert(child) {
                continue;
            }
            out.push(child);
            if let Some(kids) = self.children.get(&child) {
                stack.extend(kids.iter().rev());
            }
        }
        out
    }

    /// 以 `active` 身份操作的会话的数据范围
    ///
    /// 总是包含 `active`；合并时加入子树，策略要求时再加入上级链。
    /// 被排除的公司只解析到自身。
    pub fn accessible_company_ids(
        &self,
        active: Uuid,
        can_consolidate: bool,
        policy: AccessPolicy,
    ) -> BTreeSet<Uuid> {
        let mut ids = BTreeSet::from([active]);
        if !can_consolidate || self.is_excluded(active) {
            return ids;
        }
        ids.extend(self.descendant_ids(active));
        if policy.include_ancestors {
            ids.extend(self.ancestor_ids(active));
        }
        ids
    }
}
