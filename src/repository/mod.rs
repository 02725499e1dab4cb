//! 基于内存存储的数据访问层

pub mod auth_repo;
pub mod company_repo;
pub mod inventory_repo;
pub mod role_repo;
pub mod user_repo;

pub use auth_repo::*;
pub use company_repo::*;
pub use inventory_repo::*;
pub use role_repo::*;
pub use user_repo::*;
