//! 仓储 Trait 定义
//!
//! 定义仓储接口，便于服务层依赖抽象而非具体实现，支持 mock 测试和内存实现

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{GuidPairing, Inbox, Message};

/// 收件箱仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InboxRepositoryTrait: Send + Sync {
    /// 不存在则创建，存在则刷新 last_accessed；返回收件箱以及是否为新建
    async fn upsert_inbox(&self, account_id: &str, now: i64) -> Result<(Inbox, bool)>;
    async fn find_inbox(&self, account_id: &str) -> Result<Option<Inbox>>;
    async fn set_created_on(&self, account_id: &str, created_on: i64) -> Result<Option<Inbox>>;
}

/// 收件箱消息仓储接口
///
/// 同时维护 messages（有效消息）和 message_history（投递历史）
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepositoryTrait: Send + Sync {
    // 查询
    async fn list_by_recipient(&self, account_id: &str) -> Result<Vec<Message>>;
    async fn find_message(&self, account_id: &str, message_id: &str) -> Result<Option<Message>>;
    /// 账号曾经物化过的全局消息 ID（有效消息和历史的并集）
    async fn known_global_ids(&self, account_id: &str) -> Result<Vec<String>>;
    /// 账号是否已兑换过该活动码
    async fn has_promo(&self, account_id: &str, promo_code: &str) -> Result<bool>;

    // 投递
    /// 写入有效消息并追加历史；同一账号重复的全局消息副本会被跳过，返回实际写入数量
    async fn deliver(&self, messages: &[Message]) -> Result<u64>;

    // 修改
    /// 条件更新 UNCLAIMED -> CLAIMED，未命中（不存在或已领取）返回 None
    async fn claim(&self, account_id: &str, message_id: &str, now: i64) -> Result<Option<Message>>;
    async fn mark_history_claimed(&self, message_id: &str, claimed_on: i64) -> Result<()>;
    /// 按 id + recipient 覆盖内容字段与审计链
    async fn update_content(&self, message: &Message) -> Result<Option<Message>>;
    async fn expire(&self, account_id: &str, message_id: &str, now: i64) -> Result<Option<Message>>;
    /// 将全局消息的内容推送到所有副本，返回受影响的有效消息数量
    async fn propagate_global(&self, global: &Message) -> Result<u64>;

    // 删除
    async fn delete_expired_for(&self, account_id: &str, now: i64) -> Result<u64>;
    async fn purge_expired(&self, cutoff: i64) -> Result<u64>;
    async fn purge_history(&self, cutoff: i64) -> Result<u64>;
}

/// 全局消息目录仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GlobalMessageRepositoryTrait: Send + Sync {
    /// 全部目录，按过期时间升序
    async fn list_globals(&self) -> Result<Vec<Message>>;
    /// 当前有效（已可见且未过期）的目录
    async fn list_active_globals(&self, now: i64) -> Result<Vec<Message>>;
    async fn find_global(&self, id: &str) -> Result<Option<Message>>;
    async fn insert_global(&self, message: &Message) -> Result<()>;
    async fn update_global(&self, message: &Message) -> Result<()>;
    async fn purge_expired_globals(&self, cutoff: i64) -> Result<u64>;
}

/// 活动奖励模板仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CampaignRepositoryTrait: Send + Sync {
    /// 活动码对应的模板，expiration 为 0 或晚于 now 才返回
    async fn find_active_campaign(&self, promo_code: &str, now: i64) -> Result<Option<Message>>;
    /// 同一事务内删除同码旧模板并写入新模板，返回被替换的数量
    async fn replace_campaigns(&self, campaigns: &[Message]) -> Result<u64>;
}

/// 领取链接仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PairingRepositoryTrait: Send + Sync {
    /// 同一事务内删除该账号同码旧链接并写入新链接，返回被替换的数量
    async fn replace_pairings(&self, account_id: &str, pairings: &[GuidPairing]) -> Result<u64>;
    /// expiration >= now 的链接
    async fn find_valid_pairing(&self, id: &str, now: i64) -> Result<Option<GuidPairing>>;
    async fn delete_pairing(&self, id: &str) -> Result<bool>;
    async fn delete_expired_pairings(&self, now: i64) -> Result<u64>;
}
