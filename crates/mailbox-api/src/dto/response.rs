//! 响应 DTO 定义

use mailbox::{GuidPairing, Message};
use serde::Serialize;

/// API 统一响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// 创建成功响应
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: "操作成功".to_string(),
            data: Some(data),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResponse {
    pub claimed: Vec<Message>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalMessagesResponse {
    pub global_messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentResponse {
    pub sent: Vec<Message>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignsResponse {
    pub campaigns: Vec<Message>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingsResponse {
    pub pairings: Vec<GuidPairing>,
}

/// 活动奖励兑换结果，redirectUrl 来自活动模板
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardResponse {
    pub redirect_url: Option<String>,
    pub message: Message,
}

impl From<Message> for RewardResponse {
    fn from(message: Message) -> Self {
        Self {
            redirect_url: message.redirect_url.clone(),
            message,
        }
    }
}
