//! 测试工具模块
//!
//! 提供实现全部仓储接口的内存存储 `MemoryStore`，语义与 PostgreSQL 实现保持一致：
//! 全局消息副本按 (recipient, global_message_id) 去重、历史表中 (recipient, promo_code) 唯一、
//! 领取为条件更新。所有表共用一把锁，单次调用等价于一个事务。
//!
//! 用于服务层集成测试以及 HTTP 层的路由测试。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{MailboxError, Result};
use crate::fanout;
use crate::models::{Attachment, GuidPairing, Inbox, Message, MessageStatus};
use crate::repository::{
    CampaignRepositoryTrait, GlobalMessageRepositoryTrait, InboxRepositoryTrait,
    MessageRepositoryTrait, PairingRepositoryTrait,
};
use crate::service::MailboxServices;

#[derive(Default)]
struct Tables {
    inboxes: HashMap<String, Inbox>,
    messages: HashMap<String, Message>,
    history: HashMap<String, Message>,
    globals: HashMap<String, Message>,
    /// 以 promo_code 为键
    campaigns: HashMap<String, Message>,
    pairings: HashMap<String, GuidPairing>,
}

/// 内存存储
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以当前存储组装全部服务
    pub fn services(&self) -> MailboxServices {
        let store = Arc::new(self.clone());
        MailboxServices::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store,
        )
    }

    // ==================== 测试辅助 ====================

    /// messages 表中的全部记录（不做可见性过滤）
    pub async fn stored_messages(&self, account_id: &str) -> Vec<Message> {
        let tables = self.tables.read().await;
        let mut messages: Vec<Message> = tables
            .messages
            .values()
            .filter(|m| m.recipient.as_deref() == Some(account_id))
            .cloned()
            .collect();
        fanout::sort_by_expiration(&mut messages);
        messages
    }

    pub async fn history_for(&self, account_id: &str) -> Vec<Message> {
        let tables = self.tables.read().await;
        let mut history: Vec<Message> = tables
            .history
            .values()
            .filter(|m| m.recipient.as_deref() == Some(account_id))
            .cloned()
            .collect();
        fanout::sort_by_expiration(&mut history);
        history
    }

    pub async fn pairing_count(&self) -> usize {
        self.tables.read().await.pairings.len()
    }

    /// 直接写入一条全局消息目录，跳过校验
    pub async fn seed_global(&self, global: Message) {
        self.tables
            .write()
            .await
            .globals
            .insert(global.id.clone(), global);
    }
}

/// 构造一条可以通过校验的消息
pub fn sample_message(subject: &str, expiration: i64) -> Message {
    Message {
        subject: subject.to_string(),
        body: format!("{} body", subject),
        attachments: vec![Attachment::new("currency", "gems", 10)],
        expiration,
        ..Default::default()
    }
}

/// 构造一个符合格式的账号 ID
pub fn account_id(n: u32) -> String {
    format!("{:024x}", n)
}

fn copy_content(target: &mut Message, source: &Message) {
    target.subject = source.subject.clone();
    target.body = source.body.clone();
    target.attachments = source.attachments.clone();
    target.data = source.data.clone();
    target.expiration = source.expiration;
    target.visible_from = source.visible_from;
    target.icon = source.icon.clone();
    target.banner = source.banner.clone();
    target.internal_note = source.internal_note.clone();
}

fn remove_where(map: &mut HashMap<String, Message>, pred: impl Fn(&Message) -> bool) -> u64 {
    let before = map.len();
    map.retain(|_, m| !pred(m));
    (before - map.len()) as u64
}

// ==================== 收件箱 ====================

#[async_trait]
impl InboxRepositoryTrait for MemoryStore {
    async fn upsert_inbox(&self, account_id: &str, now: i64) -> Result<(Inbox, bool)> {
        let mut tables = self.tables.write().await;
        match tables.inboxes.get_mut(account_id) {
            Some(inbox) => {
                inbox.last_accessed = now;
                Ok((inbox.clone(), false))
            }
            None => {
                let inbox = Inbox::new(account_id, now);
                tables
                    .inboxes
                    .insert(account_id.to_string(), inbox.clone());
                Ok((inbox, true))
            }
        }
    }

    async fn find_inbox(&self, account_id: &str) -> Result<Option<Inbox>> {
        Ok(self.tables.read().await.inboxes.get(account_id).cloned())
    }

    async fn set_created_on(&self, account_id: &str, created_on: i64) -> Result<Option<Inbox>> {
        let mut tables = self.tables.write().await;
        Ok(tables.inboxes.get_mut(account_id).map(|inbox| {
            inbox.created_on = created_on;
            inbox.clone()
        }))
    }
}

// ==================== 消息 ====================

#[async_trait]
impl MessageRepositoryTrait for MemoryStore {
    async fn list_by_recipient(&self, account_id: &str) -> Result<Vec<Message>> {
        Ok(self.stored_messages(account_id).await)
    }

    async fn find_message(&self, account_id: &str, message_id: &str) -> Result<Option<Message>> {
        let tables = self.tables.read().await;
        Ok(tables
            .messages
            .get(message_id)
            .filter(|m| m.recipient.as_deref() == Some(account_id))
            .cloned())
    }

    async fn known_global_ids(&self, account_id: &str) -> Result<Vec<String>> {
        let tables = self.tables.read().await;
        let ids: HashSet<String> = tables
            .messages
            .values()
            .chain(tables.history.values())
            .filter(|m| m.recipient.as_deref() == Some(account_id))
            .filter_map(|m| m.global_message_id.clone())
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn has_promo(&self, account_id: &str, promo_code: &str) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .messages
            .values()
            .chain(tables.history.values())
            .any(|m| {
                m.recipient.as_deref() == Some(account_id)
                    && m.promo_code.as_deref() == Some(promo_code)
            }))
    }

    async fn deliver(&self, messages: &[Message]) -> Result<u64> {
        let mut tables = self.tables.write().await;

        // 先确定要写入的消息，任一冲突则整体回滚
        let mut pending: Vec<&Message> = Vec::new();
        for message in messages {
            let recipient = message.recipient.as_deref();

            if let Some(global_id) = message.global_message_id.as_deref() {
                let exists = tables
                    .messages
                    .values()
                    .chain(pending.iter().copied())
                    .any(|m| {
                        m.recipient.as_deref() == recipient
                            && m.global_message_id.as_deref() == Some(global_id)
                    });
                if exists {
                    continue;
                }
            }

            if let Some(code) = message.promo_code.as_deref() {
                let redeemed = tables
                    .history
                    .values()
                    .chain(pending.iter().copied())
                    .any(|m| m.recipient.as_deref() == recipient && m.promo_code.as_deref() == Some(code));
                if redeemed {
                    return Err(MailboxError::DuplicateKey(format!(
                        "recipient={}, promo_code={}",
                        recipient.unwrap_or_default(),
                        code
                    )));
                }
            }

            pending.push(message);
        }

        for message in &pending {
            tables
                .messages
                .insert(message.id.clone(), (*message).clone());
            tables
                .history
                .entry(message.id.clone())
                .or_insert_with(|| (*message).clone());
        }

        Ok(pending.len() as u64)
    }

    async fn claim(&self, account_id: &str, message_id: &str, now: i64) -> Result<Option<Message>> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .messages
            .get_mut(message_id)
            .filter(|m| {
                m.recipient.as_deref() == Some(account_id) && m.status == MessageStatus::Unclaimed
            })
            .map(|m| {
                m.status = MessageStatus::Claimed;
                m.claimed_on = Some(now);
                m.clone()
            }))
    }

    async fn mark_history_claimed(&self, message_id: &str, claimed_on: i64) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(entry) = tables
            .history
            .get_mut(message_id)
            .filter(|m| m.status == MessageStatus::Unclaimed)
        {
            entry.status = MessageStatus::Claimed;
            entry.claimed_on = Some(claimed_on);
        }
        Ok(())
    }

    async fn update_content(&self, message: &Message) -> Result<Option<Message>> {
        let mut tables = self.tables.write().await;
        let updated = tables
            .messages
            .get_mut(&message.id)
            .filter(|m| m.recipient == message.recipient)
            .map(|m| {
                copy_content(m, message);
                m.previous_versions = message.previous_versions.clone();
                m.clone()
            });

        if updated.is_some() {
            if let Some(entry) = tables.history.get_mut(&message.id) {
                copy_content(entry, message);
            }
        }
        Ok(updated)
    }

    async fn expire(&self, account_id: &str, message_id: &str, now: i64) -> Result<Option<Message>> {
        let mut tables = self.tables.write().await;
        let expired = tables
            .messages
            .get_mut(message_id)
            .filter(|m| m.recipient.as_deref() == Some(account_id))
            .map(|m| {
                m.expiration = now;
                m.clone()
            });

        if expired.is_some() {
            if let Some(entry) = tables.history.get_mut(message_id) {
                entry.expiration = now;
            }
        }
        Ok(expired)
    }

    async fn propagate_global(&self, global: &Message) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let matches = |m: &Message| {
            m.global_message_id.as_deref() == Some(global.id.as_str()) || m.id == global.id
        };

        let mut affected = 0;
        for message in tables.messages.values_mut().filter(|m| matches(m)) {
            copy_content(message, global);
            affected += 1;
        }
        for entry in tables.history.values_mut().filter(|m| matches(m)) {
            copy_content(entry, global);
        }
        Ok(affected)
    }

    async fn delete_expired_for(&self, account_id: &str, now: i64) -> Result<u64> {
        let mut tables = self.tables.write().await;
        Ok(remove_where(&mut tables.messages, |m| {
            m.recipient.as_deref() == Some(account_id) && m.expiration <= now
        }))
    }

    async fn purge_expired(&self, cutoff: i64) -> Result<u64> {
        let mut tables = self.tables.write().await;
        Ok(remove_where(&mut tables.messages, |m| m.expiration <= cutoff))
    }

    async fn purge_history(&self, cutoff: i64) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let Tables {
            history, globals, ..
        } = &mut *tables;
        let catalog_kept = |m: &Message| {
            m.global_message_id
                .as_ref()
                .and_then(|id| globals.get(id))
                .is_some_and(|g| g.expiration > cutoff)
        };
        Ok(remove_where(history, |m| {
            m.expiration <= cutoff && !catalog_kept(m)
        }))
    }
}

// ==================== 全局消息目录 ====================

#[async_trait]
impl GlobalMessageRepositoryTrait for MemoryStore {
    async fn list_globals(&self) -> Result<Vec<Message>> {
        let mut globals: Vec<Message> = self.tables.read().await.globals.values().cloned().collect();
        fanout::sort_by_expiration(&mut globals);
        Ok(globals)
    }

    async fn list_active_globals(&self, now: i64) -> Result<Vec<Message>> {
        let mut globals: Vec<Message> = self
            .tables
            .read()
            .await
            .globals
            .values()
            .filter(|g| g.is_live_at(now))
            .cloned()
            .collect();
        fanout::sort_by_expiration(&mut globals);
        Ok(globals)
    }

    async fn find_global(&self, id: &str) -> Result<Option<Message>> {
        Ok(self.tables.read().await.globals.get(id).cloned())
    }

    async fn insert_global(&self, message: &Message) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.globals.contains_key(&message.id) {
            return Err(MailboxError::DuplicateKey(format!("id={}", message.id)));
        }
        tables.globals.insert(message.id.clone(), message.clone());
        Ok(())
    }

    async fn update_global(&self, message: &Message) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(global) = tables.globals.get_mut(&message.id) {
            copy_content(global, message);
            global.for_accounts_before = message.for_accounts_before;
            global.previous_versions = message.previous_versions.clone();
        }
        Ok(())
    }

    async fn purge_expired_globals(&self, cutoff: i64) -> Result<u64> {
        let mut tables = self.tables.write().await;
        Ok(remove_where(&mut tables.globals, |m| m.expiration <= cutoff))
    }
}

// ==================== 活动模板 ====================

#[async_trait]
impl CampaignRepositoryTrait for MemoryStore {
    async fn find_active_campaign(&self, promo_code: &str, now: i64) -> Result<Option<Message>> {
        Ok(self
            .tables
            .read()
            .await
            .campaigns
            .get(promo_code)
            .filter(|c| c.expiration == 0 || c.expiration > now)
            .cloned())
    }

    async fn replace_campaigns(&self, campaigns: &[Message]) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let mut replaced = 0;
        for campaign in campaigns {
            let code = campaign.promo_code.clone().unwrap_or_default();
            if tables.campaigns.insert(code, campaign.clone()).is_some() {
                replaced += 1;
            }
        }
        Ok(replaced)
    }
}

// ==================== 领取链接 ====================

#[async_trait]
impl PairingRepositoryTrait for MemoryStore {
    async fn replace_pairings(&self, account_id: &str, pairings: &[GuidPairing]) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let codes: HashSet<&str> = pairings.iter().map(|p| p.promo_code.as_str()).collect();

        let before = tables.pairings.len();
        tables
            .pairings
            .retain(|_, p| !(p.account_id == account_id && codes.contains(p.promo_code.as_str())));
        let replaced = (before - tables.pairings.len()) as u64;

        for pairing in pairings {
            tables.pairings.insert(pairing.id.clone(), pairing.clone());
        }
        Ok(replaced)
    }

    async fn find_valid_pairing(&self, id: &str, now: i64) -> Result<Option<GuidPairing>> {
        Ok(self
            .tables
            .read()
            .await
            .pairings
            .get(id)
            .filter(|p| p.is_valid_at(now))
            .cloned())
    }

    async fn delete_pairing(&self, id: &str) -> Result<bool> {
        Ok(self.tables.write().await.pairings.remove(id).is_some())
    }

    async fn delete_expired_pairings(&self, now: i64) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.pairings.len();
        tables.pairings.retain(|_, p| p.expiration > now);
        Ok((before - tables.pairings.len()) as u64)
    }
}
