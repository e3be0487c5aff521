//! 共享库
//!
//! 包含邮箱服务各 crate 共用的配置、动态配置、错误处理、数据库连接、可观测性等基础设施代码。

pub mod config;
pub mod config_watcher;
pub mod database;
pub mod error;
pub mod observability;
pub mod timestamp;
