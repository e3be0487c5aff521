//! 请求 DTO 定义
//!
//! 字段名使用 camelCase，与客户端和管理后台约定一致。
//! 消息体本身的字段校验由领域模型完成，这里只校验外层结构。

use mailbox::Message;
use serde::Deserialize;
use validator::Validate;

/// 领取消息；不传 messageId 表示领取全部
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    #[validate(length(max = 64, message = "messageId 过长"))]
    pub message_id: Option<String>,
}

/// 查询全局消息目录
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGlobalMessagesQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

/// 发布或编辑全局消息
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalMessageRequest {
    pub global_message: Message,
}

/// 立即过期全局消息
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExpireGlobalMessageRequest {
    #[validate(length(min = 1, message = "messageId 不能为空"))]
    pub message_id: String,
}

/// 直发给指定账号
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 10000, message = "accountIds 数量必须在 1-10000 之间"))]
    pub account_ids: Vec<String>,
    pub message: Message,
}

/// 批量发送，每条消息自带 accountId
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BulkSendRequest {
    #[validate(length(min = 1, max = 10000, message = "messages 数量必须在 1-10000 之间"))]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub fail_fast: bool,
}

/// 编辑单个账号的消息，message 需带 accountId 和 id
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMessageRequest {
    pub message: Message,
}

/// 立即过期单个账号的消息
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ExpireMessageRequest {
    #[validate(length(min = 1, message = "accountId 不能为空"))]
    pub account_id: String,
    #[validate(length(min = 1, message = "messageId 不能为空"))]
    pub message_id: String,
}

/// 管理员查看任意账号收件箱
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AccountQuery {
    #[validate(length(min = 1, message = "accountId 不能为空"))]
    pub account_id: String,
}

/// 定义活动奖励模板
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DefineCampaignsRequest {
    #[validate(length(min = 1, message = "campaigns 不能为空"))]
    pub campaigns: Vec<Message>,
}

/// 生成领取链接
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePairingsRequest {
    #[validate(length(min = 1, message = "accountId 不能为空"))]
    pub account_id: String,
    pub expiration: i64,
    #[validate(length(min = 1, message = "promoCodes 不能为空"))]
    pub promo_codes: Vec<String>,
}

/// 兑换活动奖励
///
/// 直领模式使用 promoCode + accountId，GUID 模式使用 guid
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRewardQuery {
    pub promo_code: Option<String>,
    pub account_id: Option<String>,
    pub guid: Option<String>,
}

/// 修改账号注册时间
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InboxAgeRequest {
    #[validate(length(min = 1, message = "accountId 不能为空"))]
    pub account_id: String,
    #[validate(range(min = 0, max = 36500, message = "days 必须在 0-36500 之间"))]
    pub days: i64,
}
