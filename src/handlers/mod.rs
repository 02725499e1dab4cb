//! HTTP 处理器模块

pub mod auth;
pub mod company;
pub mod health;
pub mod inventory;
pub mod role;
pub mod session;
pub mod user;
