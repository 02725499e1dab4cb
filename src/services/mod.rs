//! 业务服务层

pub mod auth_service;
pub mod company_service;
pub mod context_service;
pub mod hierarchy;
pub mod inventory_service;
pub mod role_service;
pub mod user_service;

pub use auth_service::AuthService;
pub use company_service::CompanyService;
pub use context_service::ContextService;
pub use hierarchy::{AccessPolicy, CompanyHierarchy};
pub use inventory_service::InventoryService;
pub use role_service::RoleService;
pub use user_service::UserService;
