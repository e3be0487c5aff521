//! 直发消息服务
//!
//! 管理员直发给指定账号、批量发送（每条消息自带收件人）、编辑和过期单个账号的消息。

use std::collections::HashSet;
use std::sync::Arc;

use mailbox_shared::observability::metrics;
use mailbox_shared::timestamp;
use tracing::{info, instrument, warn};

use crate::error::{MailboxError, Result};
use crate::models::{Message, MessageKind};
use crate::repository::MessageRepositoryTrait;
use crate::service::dto::{BulkFailure, BulkSendReport};

/// 直发消息服务
pub struct MessageService {
    messages: Arc<dyn MessageRepositoryTrait>,
}

impl MessageService {
    pub fn new(messages: Arc<dyn MessageRepositoryTrait>) -> Self {
        Self { messages }
    }

    /// 为每个账号写入一份独立副本
    #[instrument(skip(self, message), fields(accounts = account_ids.len()))]
    pub async fn send_to(&self, account_ids: &[String], mut message: Message) -> Result<Vec<Message>> {
        let mut seen = HashSet::new();
        let recipients: Vec<&str> = account_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty() && seen.insert(*id))
            .collect();
        if recipients.is_empty() {
            return Err(MailboxError::RequiredFieldMissing("accountIds"));
        }

        message.validate(MessageKind::Direct)?;
        message.clear_campaign_fields();

        let now = timestamp::now();
        let copies: Vec<Message> = recipients
            .iter()
            .map(|account_id| message.instantiate_for(account_id, now))
            .collect();

        let delivered = self.messages.deliver(&copies).await?;
        metrics::record_materialized("direct", delivered);
        info!(delivered, "直发消息已写入");

        Ok(copies)
    }

    /// 批量发送
    ///
    /// `fail_fast` 为 true 时遇到第一条非法消息即返回错误，不写入任何消息；
    /// 否则写入所有合法消息，非法消息按下标报告。
    #[instrument(skip(self, messages), fields(count = messages.len()))]
    pub async fn bulk_send(&self, messages: Vec<Message>, fail_fast: bool) -> Result<BulkSendReport> {
        let now = timestamp::now();
        let mut report = BulkSendReport::default();

        for (index, mut message) in messages.into_iter().enumerate() {
            match message.validate(MessageKind::Bulk) {
                Ok(()) => {
                    message.clear_campaign_fields();
                    let recipient = message.recipient.clone().unwrap_or_default();
                    report
                        .sent
                        .push(message.instantiate_for(recipient.trim(), now));
                }
                Err(e) if fail_fast => return Err(e),
                Err(e) => {
                    warn!(index, error = %e, "批量消息校验失败，跳过");
                    report
                        .failures
                        .push(BulkFailure::new(index, message.recipient.clone(), &e));
                }
            }
        }

        let delivered = self.messages.deliver(&report.sent).await?;
        metrics::record_materialized("bulk", delivered);
        info!(delivered, failed = report.failures.len(), "批量消息已写入");

        Ok(report)
    }

    /// 编辑单个账号的消息
    ///
    /// 必须同时提供 accountId 和 id，只允许修改该账号自己的消息。
    #[instrument(skip(self, edited), fields(message_id = %edited.id))]
    pub async fn edit(&self, mut edited: Message) -> Result<Message> {
        let account_id = edited
            .recipient
            .clone()
            .filter(|r| !r.trim().is_empty())
            .ok_or(MailboxError::RequiredFieldMissing("accountId"))?;
        if edited.id.trim().is_empty() {
            return Err(MailboxError::RequiredFieldMissing("id"));
        }
        edited.validate(MessageKind::Direct)?;

        let not_found = || MailboxError::MessageNotFound {
            account_id: account_id.clone(),
            message_id: edited.id.clone(),
        };

        let mut message = self
            .messages
            .find_message(&account_id, &edited.id)
            .await?
            .ok_or_else(not_found)?;

        message.record_previous_version(timestamp::now());
        message.apply_edit(&edited);

        let updated = self
            .messages
            .update_content(&message)
            .await?
            .ok_or_else(not_found)?;

        info!(account_id = %account_id, "消息已编辑");
        Ok(updated)
    }

    /// 立即过期单个账号的消息
    #[instrument(skip(self))]
    pub async fn expire(&self, account_id: &str, message_id: &str) -> Result<Message> {
        let expired = self
            .messages
            .expire(account_id, message_id, timestamp::now())
            .await?
            .ok_or_else(|| MailboxError::MessageNotFound {
                account_id: account_id.to_string(),
                message_id: message_id.to_string(),
            })?;

        info!(account_id, message_id, "消息已过期");
        Ok(expired)
    }
}
