//! 游戏邮箱核心库
//!
//! 每个账号一个收件箱，消息来源：
//!
//! - 管理员直发（单个或多个账号、批量）
//! - 全局消息：只写入目录，账号读取收件箱时按受众条件懒物化为个人副本
//! - 活动奖励：通过活动码或预发放的领取链接兑换
//!
//! 领取（UNCLAIMED -> CLAIMED）是单向的；过期消息由后台任务在保留缓冲期后物理删除。

pub mod error;
pub mod fanout;
pub mod models;
pub mod repository;
pub mod service;
pub mod test_utils;
pub mod worker;

pub use error::{ErrorKind, MailboxError, Result};
pub use models::*;
pub use service::MailboxServices;
