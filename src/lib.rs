//! 多公司 ERP 会话上下文服务
//! 公司层级、权限与会话上下文、库存与分录联动，以及客户端会话状态机

pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod realtime;
pub mod repository;
pub mod routes;
pub mod seed;
pub mod services;
pub mod telemetry;
