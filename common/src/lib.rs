//! items API 服务公共模块
//!
//! - `config`: 服务配置与数据库连接描述解析
//! - `errors`: 统一错误类型
//! - `models`: 共享数据模型
//! - `middleware`: 通用中间件
//! - `response`: 错误响应包装

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod response;
