//! 收件箱服务
//!
//! 每次读取收件箱都会进行一次调和：
//!
//! 1. 懒创建收件箱（刷新 last_accessed）
//! 2. 将有效且符合受众条件、尚未物化过的全局消息写入收件箱
//! 3. 已有收件箱移除已过期的消息
//! 4. 返回已可见且未过期的消息，按过期时间升序
//!
//! 第 2、3 步失败只记录日志，读取路径仍返回已有消息。

use std::collections::HashSet;
use std::sync::Arc;

use mailbox_shared::observability::metrics;
use mailbox_shared::timestamp;
use tracing::{info, instrument, warn};

use crate::error::{MailboxError, Result};
use crate::fanout;
use crate::models::Inbox;
use crate::repository::{
    GlobalMessageRepositoryTrait, InboxRepositoryTrait, MessageRepositoryTrait,
};

/// 收件箱服务
pub struct InboxService {
    inboxes: Arc<dyn InboxRepositoryTrait>,
    messages: Arc<dyn MessageRepositoryTrait>,
    globals: Arc<dyn GlobalMessageRepositoryTrait>,
}

impl InboxService {
    pub fn new(
        inboxes: Arc<dyn InboxRepositoryTrait>,
        messages: Arc<dyn MessageRepositoryTrait>,
        globals: Arc<dyn GlobalMessageRepositoryTrait>,
    ) -> Self {
        Self {
            inboxes,
            messages,
            globals,
        }
    }

    /// 调和并返回收件箱的可见消息
    #[instrument(skip(self))]
    pub async fn reconcile(&self, account_id: &str) -> Result<Inbox> {
        let now = timestamp::now();
        let (inbox, created) = self.inboxes.upsert_inbox(account_id, now).await?;

        match self.materialize_globals(&inbox, now).await {
            Ok(0) => {}
            Ok(count) => info!(account_id, count, created, "全局消息已物化到收件箱"),
            Err(e) => warn!(account_id, error = %e, "全局消息物化失败，返回已有消息"),
        }

        if !created {
            match self.messages.delete_expired_for(account_id, now).await {
                Ok(0) => {}
                Ok(removed) => info!(account_id, removed, "已移除过期消息"),
                Err(e) => warn!(account_id, error = %e, "移除过期消息失败"),
            }
        }

        let messages = self.messages.list_by_recipient(account_id).await?;
        Ok(inbox.with_messages(fanout::visible_messages(messages, now)))
    }

    async fn materialize_globals(&self, inbox: &Inbox, now: i64) -> Result<u64> {
        let globals = self.globals.list_active_globals(now).await?;
        if globals.is_empty() {
            return Ok(0);
        }

        let known: HashSet<String> = self
            .messages
            .known_global_ids(&inbox.account_id)
            .await?
            .into_iter()
            .collect();

        let planned = fanout::plan_materialization(&globals, &known, inbox, now);
        if planned.is_empty() {
            return Ok(0);
        }

        let delivered = self.messages.deliver(&planned).await?;
        metrics::record_materialized("global", delivered);
        Ok(delivered)
    }

    /// 账号注册时间必须早于 now - seconds
    ///
    /// 未知账号会被懒创建，视为刚注册。
    #[instrument(skip(self))]
    pub async fn enforce_account_age_over(&self, account_id: &str, seconds: i64) -> Result<()> {
        let now = timestamp::now();
        let (inbox, _) = self.inboxes.upsert_inbox(account_id, now).await?;

        if inbox.created_on > now - seconds {
            return Err(MailboxError::AccountTooYoung {
                account_id: account_id.to_string(),
                required_seconds: seconds,
            });
        }
        Ok(())
    }

    /// 将账号注册时间改为 N 天前（测试与客服工具）
    #[instrument(skip(self))]
    pub async fn set_account_age(&self, account_id: &str, days: i64) -> Result<Inbox> {
        let created_on = timestamp::in_the_past(days);
        let inbox = self
            .inboxes
            .set_created_on(account_id, created_on)
            .await?
            .ok_or_else(|| MailboxError::InboxNotFound(account_id.to_string()))?;

        info!(account_id, days, created_on, "账号注册时间已修改");
        Ok(inbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attachment, Message};
    use crate::repository::{
        MockGlobalMessageRepositoryTrait, MockInboxRepositoryTrait, MockMessageRepositoryTrait,
    };

    fn direct(id: &str, expiration: i64) -> Message {
        Message {
            id: id.to_string(),
            recipient: Some("acct".to_string()),
            subject: "s".to_string(),
            body: "b".to_string(),
            attachments: vec![Attachment::new("currency", "gems", 1)],
            expiration,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_reconcile_survives_materialization_failure() {
        let now = timestamp::now();

        let mut inboxes = MockInboxRepositoryTrait::new();
        inboxes
            .expect_upsert_inbox()
            .returning(move |id, _| Ok((Inbox::new(id, now - 100), false)));

        let mut globals = MockGlobalMessageRepositoryTrait::new();
        globals
            .expect_list_active_globals()
            .returning(|_| Err(MailboxError::Internal("catalog unavailable".into())));

        let mut messages = MockMessageRepositoryTrait::new();
        messages.expect_delete_expired_for().returning(|_, _| Ok(0));
        messages
            .expect_list_by_recipient()
            .returning(move |_| Ok(vec![direct("m1", now + 100)]));
        messages.expect_deliver().never();

        let service = InboxService::new(Arc::new(inboxes), Arc::new(messages), Arc::new(globals));
        let inbox = service.reconcile("acct").await.unwrap();

        assert_eq!(inbox.messages.len(), 1);
        assert_eq!(inbox.messages[0].id, "m1");
    }

    #[tokio::test]
    async fn test_new_inbox_skips_expired_cleanup() {
        let now = timestamp::now();

        let mut inboxes = MockInboxRepositoryTrait::new();
        inboxes
            .expect_upsert_inbox()
            .returning(move |id, _| Ok((Inbox::new(id, now), true)));

        let mut globals = MockGlobalMessageRepositoryTrait::new();
        globals.expect_list_active_globals().returning(|_| Ok(vec![]));

        let mut messages = MockMessageRepositoryTrait::new();
        messages.expect_delete_expired_for().never();
        messages.expect_list_by_recipient().returning(|_| Ok(vec![]));

        let service = InboxService::new(Arc::new(inboxes), Arc::new(messages), Arc::new(globals));
        let inbox = service.reconcile("acct").await.unwrap();
        assert!(inbox.messages.is_empty());
    }

    #[tokio::test]
    async fn test_set_account_age_missing_inbox() {
        let mut inboxes = MockInboxRepositoryTrait::new();
        inboxes.expect_set_created_on().returning(|_, _| Ok(None));

        let service = InboxService::new(
            Arc::new(inboxes),
            Arc::new(MockMessageRepositoryTrait::new()),
            Arc::new(MockGlobalMessageRepositoryTrait::new()),
        );
        let err = service.set_account_age("ghost", 3).await.unwrap_err();
        assert_eq!(err.error_code(), "INBOX_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_enforce_account_age() {
        let now = timestamp::now();
        let mut inboxes = MockInboxRepositoryTrait::new();
        inboxes
            .expect_upsert_inbox()
            .returning(move |id, _| Ok((Inbox::new(id, now - 3_600), false)));

        let service = InboxService::new(
            Arc::new(inboxes),
            Arc::new(MockMessageRepositoryTrait::new()),
            Arc::new(MockGlobalMessageRepositoryTrait::new()),
        );

        assert!(service.enforce_account_age_over("acct", 60).await.is_ok());
        let err = service
            .enforce_account_age_over("acct", 7_200)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "ACCOUNT_TOO_YOUNG");
    }
}
