//! 全局消息服务
//!
//! 目录条目是全局消息的唯一来源：发布只写目录，副本在各账号调和时物化；
//! 编辑和过期先更新目录（保存修改前快照），再把字段变更推送到所有已物化副本。
//! 副本推送不在同一事务内，失败只记录日志，后续读取最终收敛。

use std::sync::Arc;

use mailbox_shared::timestamp;
use tracing::{error, info, instrument};

use crate::error::{MailboxError, Result};
use crate::fanout;
use crate::models::{Message, MessageKind};
use crate::repository::{GlobalMessageRepositoryTrait, MessageRepositoryTrait};
use crate::service::dto::GlobalUpdate;

/// 全局消息服务
pub struct GlobalMessageService {
    globals: Arc<dyn GlobalMessageRepositoryTrait>,
    messages: Arc<dyn MessageRepositoryTrait>,
}

impl GlobalMessageService {
    pub fn new(
        globals: Arc<dyn GlobalMessageRepositoryTrait>,
        messages: Arc<dyn MessageRepositoryTrait>,
    ) -> Self {
        Self { globals, messages }
    }

    /// 目录列表，按过期时间升序；默认不含已过期条目
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Message>> {
        let now = timestamp::now();
        let mut globals: Vec<Message> = self
            .globals
            .list_globals()
            .await?
            .into_iter()
            .filter(|g| include_inactive || !g.is_expired_at(now))
            .collect();
        fanout::sort_by_expiration(&mut globals);
        Ok(globals)
    }

    /// 发布全局消息
    #[instrument(skip(self, message), fields(subject = %message.subject))]
    pub async fn send(&self, mut message: Message) -> Result<Message> {
        message.validate(MessageKind::Global)?;

        let now = timestamp::now();
        message.id = Message::new_id();
        message.recipient = None;
        message.global_message_id = None;
        message.promo_code = None;
        message.prepare_new(now);

        self.globals.insert_global(&message).await?;
        info!(global_message_id = %message.id, "全局消息已发布");

        Ok(message)
    }

    /// 编辑全局消息并同步到所有副本
    #[instrument(skip(self, edited), fields(global_message_id = %edited.id))]
    pub async fn edit(&self, mut edited: Message) -> Result<GlobalUpdate> {
        if edited.id.trim().is_empty() {
            return Err(MailboxError::RequiredFieldMissing("id"));
        }
        edited.validate(MessageKind::Global)?;

        let mut global = self.load(&edited.id).await?;
        let now = timestamp::now();
        global.record_previous_version(now);
        global.apply_edit(&edited);

        self.commit(global).await
    }

    /// 立即过期全局消息并同步到所有副本
    #[instrument(skip(self))]
    pub async fn expire(&self, global_message_id: &str) -> Result<GlobalUpdate> {
        let mut global = self.load(global_message_id).await?;
        let now = timestamp::now();
        global.record_previous_version(now);
        global.expiration = now;

        self.commit(global).await
    }

    async fn load(&self, id: &str) -> Result<Message> {
        self.globals
            .find_global(id)
            .await?
            .ok_or_else(|| MailboxError::GlobalMessageNotFound(id.to_string()))
    }

    async fn commit(&self, global: Message) -> Result<GlobalUpdate> {
        self.globals.update_global(&global).await?;

        let affected = match self.messages.propagate_global(&global).await {
            Ok(affected) => affected,
            Err(e) => {
                error!(global_message_id = %global.id, error = %e, "全局消息副本同步失败");
                0
            }
        };
        info!(global_message_id = %global.id, affected, "全局消息已更新");

        Ok(GlobalUpdate {
            global_message: global,
            affected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MockGlobalMessageRepositoryTrait, MockMessageRepositoryTrait};

    fn stored(now: i64) -> Message {
        Message {
            id: "g1".to_string(),
            subject: "old".to_string(),
            body: "body".to_string(),
            expiration: now + 1_000,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_edit_survives_propagation_failure() {
        let now = timestamp::now();
        let mut globals = MockGlobalMessageRepositoryTrait::new();
        globals
            .expect_find_global()
            .returning(move |_| Ok(Some(stored(now))));
        globals
            .expect_update_global()
            .withf(|g| g.subject == "new" && g.previous_versions.len() == 1)
            .returning(|_| Ok(()));

        let mut messages = MockMessageRepositoryTrait::new();
        messages
            .expect_propagate_global()
            .returning(|_| Err(MailboxError::Internal("timeout".into())));

        let service = GlobalMessageService::new(Arc::new(globals), Arc::new(messages));
        let update = service
            .edit(Message {
                subject: "new".to_string(),
                ..stored(now)
            })
            .await
            .unwrap();

        assert_eq!(update.affected, 0);
        assert_eq!(update.global_message.subject, "new");
        assert_eq!(update.global_message.previous_versions[0].subject, "old");
    }

    #[tokio::test]
    async fn test_edit_rejects_invalid_before_lookup() {
        let mut globals = MockGlobalMessageRepositoryTrait::new();
        globals.expect_find_global().never();

        let service = GlobalMessageService::new(
            Arc::new(globals),
            Arc::new(MockMessageRepositoryTrait::new()),
        );
        let err = service
            .edit(Message {
                id: "g1".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_expire_unknown_global() {
        let mut globals = MockGlobalMessageRepositoryTrait::new();
        globals.expect_find_global().returning(|_| Ok(None));

        let service = GlobalMessageService::new(
            Arc::new(globals),
            Arc::new(MockMessageRepositoryTrait::new()),
        );
        let err = service.expire("missing").await.unwrap_err();
        assert_eq!(err.error_code(), "GLOBAL_MESSAGE_NOT_FOUND");
    }
}
