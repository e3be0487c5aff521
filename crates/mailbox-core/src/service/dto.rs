//! 服务层返回结构

use serde::Serialize;

use crate::error::MailboxError;
use crate::models::Message;

/// 全局消息编辑/过期结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalUpdate {
    pub global_message: Message,
    /// 被同步的副本数量
    pub affected: u64,
}

/// 批量发送中单条消息的失败原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkFailure {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    pub code: String,
    pub message: String,
}

impl BulkFailure {
    pub fn new(index: usize, account_id: Option<String>, error: &MailboxError) -> Self {
        Self {
            index,
            account_id,
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

/// 批量发送结果
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSendReport {
    pub sent: Vec<Message>,
    pub failures: Vec<BulkFailure>,
}
