//! 收件箱

use serde::{Deserialize, Serialize};

use super::Message;

/// 账号收件箱
///
/// 首次访问时懒创建。`messages` 不落在 inboxes 表中，
/// 由服务层按 recipient 从 messages 表加载。
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Inbox {
    pub account_id: String,
    pub created_on: i64,
    pub last_accessed: i64,
    #[sqlx(skip)]
    pub messages: Vec<Message>,
}

impl Inbox {
    pub fn new(account_id: &str, now: i64) -> Self {
        Self {
            account_id: account_id.to_string(),
            created_on: now,
            last_accessed: now,
            messages: Vec::new(),
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }
}
