//! 邮箱服务 HTTP 接口
//!
//! ## 模块结构
//!
//! - `auth`: JWT 校验与 Claims
//! - `dto`: 请求和响应的数据传输对象
//! - `error`: HTTP 错误映射
//! - `handlers`: HTTP 请求处理器
//! - `middleware`: 认证与管理员权限中间件
//! - `routes`: 路由配置
//! - `state`: 应用状态

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::{ApiError, Result};
pub use state::AppState;
