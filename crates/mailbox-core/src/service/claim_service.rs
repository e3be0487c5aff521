//! 领取服务
//!
//! 状态转换 UNCLAIMED -> CLAIMED 由仓储的条件更新保证原子性，
//! 同一条消息并发领取只有一次成功。奖励的实际发放由外部经济系统处理。

use std::sync::Arc;

use mailbox_shared::observability::metrics;
use mailbox_shared::timestamp;
use tracing::{info, instrument, warn};

use crate::error::{MailboxError, Result};
use crate::models::{Message, MessageStatus};
use crate::repository::MessageRepositoryTrait;

/// 领取服务
pub struct ClaimService {
    messages: Arc<dyn MessageRepositoryTrait>,
}

impl ClaimService {
    pub fn new(messages: Arc<dyn MessageRepositoryTrait>) -> Self {
        Self { messages }
    }

    /// 领取单条或全部消息
    ///
    /// `message_id` 为空时领取账号下所有可见、未过期、未领取的消息，
    /// 单条失败只记录日志；指定 `message_id` 时任何失败都返回给调用方。
    #[instrument(skip(self))]
    pub async fn claim(&self, account_id: &str, message_id: Option<&str>) -> Result<Vec<Message>> {
        match message_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => self.claim_one(account_id, id).await.map(|m| vec![m]),
            None => self.claim_all(account_id).await,
        }
    }

    async fn claim_one(&self, account_id: &str, message_id: &str) -> Result<Message> {
        let now = timestamp::now();
        let not_found = || MailboxError::MessageNotFound {
            account_id: account_id.to_string(),
            message_id: message_id.to_string(),
        };

        let message = self
            .messages
            .find_message(account_id, message_id)
            .await?
            .ok_or_else(not_found)?;

        if message.is_expired_at(now) {
            return Err(not_found());
        }
        if message.status == MessageStatus::Claimed {
            return Err(MailboxError::AlreadyClaimed(message_id.to_string()));
        }
        if !message.is_visible_at(now) {
            return Err(MailboxError::NotYetVisible(message_id.to_string()));
        }

        // 条件更新未命中说明被并发领取
        let claimed = self
            .messages
            .claim(account_id, message_id, now)
            .await?
            .ok_or_else(|| MailboxError::AlreadyClaimed(message_id.to_string()))?;

        self.sync_history(&claimed).await;
        metrics::record_claims("single", 1);
        info!(account_id, message_id, "消息已领取");

        Ok(claimed)
    }

    async fn claim_all(&self, account_id: &str) -> Result<Vec<Message>> {
        let now = timestamp::now();
        let candidates: Vec<Message> = self
            .messages
            .list_by_recipient(account_id)
            .await?
            .into_iter()
            .filter(|m| m.is_live_at(now) && !m.is_claimed())
            .collect();

        let mut claimed = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match self.messages.claim(account_id, &candidate.id, now).await {
                Ok(Some(message)) => {
                    self.sync_history(&message).await;
                    claimed.push(message);
                }
                Ok(None) => {
                    warn!(account_id, message_id = %candidate.id, "消息已被并发领取，跳过");
                }
                Err(e) => {
                    warn!(account_id, message_id = %candidate.id, error = %e, "领取消息失败，跳过");
                }
            }
        }

        metrics::record_claims("all", claimed.len() as u64);
        if !claimed.is_empty() {
            info!(account_id, count = claimed.len(), "批量领取完成");
        }
        Ok(claimed)
    }

    /// 同步历史状态，失败不影响领取结果
    async fn sync_history(&self, message: &Message) {
        let claimed_on = message.claimed_on.unwrap_or_else(timestamp::now);
        if let Err(e) = self
            .messages
            .mark_history_claimed(&message.id, claimed_on)
            .await
        {
            warn!(message_id = %message.id, error = %e, "同步领取历史失败");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockMessageRepositoryTrait;

    fn unclaimed(id: &str, now: i64) -> Message {
        Message {
            id: id.to_string(),
            recipient: Some("acct".to_string()),
            subject: "s".to_string(),
            body: "b".to_string(),
            expiration: now + 1_000,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_bulk_claim_swallows_item_failures() {
        let now = timestamp::now();
        let mut repo = MockMessageRepositoryTrait::new();
        repo.expect_list_by_recipient().returning(move |_| {
            Ok(vec![
                unclaimed("a", now),
                unclaimed("b", now),
                unclaimed("c", now),
            ])
        });
        repo.expect_claim().returning(move |_, id, ts| match id {
            "a" => Err(MailboxError::Internal("write failed".into())),
            "b" => Ok(None),
            _ => Ok(Some(Message {
                status: MessageStatus::Claimed,
                claimed_on: Some(ts),
                ..unclaimed(id, now)
            })),
        });
        repo.expect_mark_history_claimed()
            .returning(|_, _| Err(MailboxError::Internal("history down".into())));

        let service = ClaimService::new(Arc::new(repo));
        let claimed = service.claim("acct", None).await.unwrap();

        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, "c");
    }

    #[tokio::test]
    async fn test_single_claim_lost_race_is_conflict() {
        let now = timestamp::now();
        let mut repo = MockMessageRepositoryTrait::new();
        repo.expect_find_message()
            .returning(move |_, id| Ok(Some(unclaimed(id, now))));
        repo.expect_claim().returning(|_, _, _| Ok(None));

        let service = ClaimService::new(Arc::new(repo));
        let err = service.claim("acct", Some("a")).await.unwrap_err();
        assert_eq!(err.error_code(), "ALREADY_CLAIMED");
    }

    #[tokio::test]
    async fn test_single_claim_not_yet_visible() {
        let now = timestamp::now();
        let mut repo = MockMessageRepositoryTrait::new();
        repo.expect_find_message().returning(move |_, id| {
            Ok(Some(Message {
                visible_from: now + 600,
                ..unclaimed(id, now)
            }))
        });
        repo.expect_claim().never();

        let service = ClaimService::new(Arc::new(repo));
        let err = service.claim("acct", Some("a")).await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_YET_VISIBLE");
    }

    #[tokio::test]
    async fn test_blank_message_id_claims_all() {
        let mut repo = MockMessageRepositoryTrait::new();
        repo.expect_find_message().never();
        repo.expect_list_by_recipient().returning(|_| Ok(vec![]));

        let service = ClaimService::new(Arc::new(repo));
        assert!(service.claim("acct", Some("  ")).await.unwrap().is_empty());
    }
}
