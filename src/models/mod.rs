//! 数据模型模块

pub mod auth;
pub mod company;
pub mod inventory;
pub mod permission;
pub mod role;
pub mod session;
pub mod user;
