//! 权限语法与匹配
//!
//! 权限写作 `action:resource`（如 `read:customers`）。通配形式有两种：
//! `action:*` 授予该动作在所有资源上的权限，`*` 授予全部权限。字符串只在
//! 边界解析一次，匹配基于类型化的形式，`read:*` 不会与名为 `*` 的资源混淆。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionParseError {
    #[error("permission must not be empty")]
    Empty,
    #[error("permission '{0}' must have the form action:resource")]
    MissingSeparator(String),
    #[error("permission '{0}' contains an empty or invalid segment")]
    InvalidSegment(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceScope {
    Any,
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Permission {
    /// `*`
    All,
    Grant { action: String, resource: ResourceScope },
}

fn valid_segment(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

impl Permission {
    pub fn new(action: &str, resource: &str) -> Result<Self, PermissionParseError> {
        format!("{}:{}", action, resource).parse()
    }

    /// 持有 `self` 是否满足对 `required` 的检查
    pub fn grants(&self, required: &Permission) -> bool {
        match (self, required) {
            (Permission::All, _) => true,
            (Permission::Grant { .. }, Permission::All) => false,
            (
                Permission::Grant { action, resource },
                Permission::Grant {
                    action: req_action,
                    resource: req_resource,
                },
            ) => {
                if action != req_action {
                    return false;
                }
                match (resource, req_resource) {
                    (ResourceScope::Any, _) => true,
                    (ResourceScope::Named(_), ResourceScope::Any) => false,
                    (ResourceScope::Named(have), ResourceScope::Named(want)) => have == want,
                }
            }
        }
    }
}

impl FromStr for Permission {
    type Err = PermissionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PermissionParseError::Empty);
        }
        if s == "*" {
            return Ok(Permission::All);
        }

        let (action, resource) = s
            .split_once(':')
            .ok_or_else(|| PermissionParseError::MissingSeparator(s.to_string()))?;

        if !valid_segment(action) {
            return Err(PermissionParseError::InvalidSegment(s.to_string()));
        }

        let resource = match resource {
            "*" => ResourceScope::Any,
            r if valid_segment(r) => ResourceScope::Named(r.to_string()),
            _ => return Err(PermissionParseError::InvalidSegment(s.to_string())),
        };

        Ok(Permission::Grant {
            action: action.to_string(),
            resource,
        })
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::All => write!(f, "*"),
            Permission::Grant {
                action,
                resource: ResourceScope::Any,
            } => write!(f, "{}:*", action),
            Permission::Grant {
                action,
                resource: ResourceScope::Named(resource),
            } => write!(f, "{}:{}", action, resource),
        }
    }
}

impl TryFrom<String> for Permission {
    type Error = PermissionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Permission> for String {
    fn from(value: Permission) -> Self {
        value.to_string()
    }
}

/// 会话解析后去重的权限列表
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(Vec<Permission>);

impl PermissionSet {
    pub fn new(permissions: impl IntoIterator<Item = Permission>) -> Self {
        let mut out: Vec<Permission> = Vec::new();
        for p in permissions {
            if !out.contains(&p) {
                out.push(p);
            }
        }
        Self(out)
    }

    /// 解析权限字符串列表，遇到第一个格式错误即失败
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Result<Self, PermissionParseError> {
        let parsed = raw
            .iter()
            .map(|s| s.as_ref().parse::<Permission>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(parsed))
    }

    pub fn allows(&self, required: &Permission) -> bool {
        self.0.iter().any(|held| held.grants(required))
    }

    /// 持有的权限是否覆盖 `other` 的每一项
    pub fn covers(&self, other: &PermissionSet) -> bool {
        other.iter().all(|required| self.allows(required))
    }

    /// 基于字符串的检查，格式错误一律拒绝
    pub fn has_permission(&self, permission: &str) -> bool {
        match permission.parse::<Permission>() {
            Ok(required) => self.allows(&required),
            Err(_) => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
