//! 消息模型
//!
//! 直发消息、全局消息、全局消息的物化副本以及活动奖励模板共用同一个 `Message` 类型，
//! 通过可选字段区分：
//!
//! | 用途 | recipient | global_message_id | promo_code | for_accounts_before |
//! |------|-----------|-------------------|------------|---------------------|
//! | 直发消息 | 有 | 无 | 无 | 无 |
//! | 全局消息目录 | 无 | 无 | 无 | 可选 |
//! | 全局消息副本 | 有 | 有 | 无 | 无 |
//! | 活动模板 | 无 | 无 | 有 | 无 |
//! | 活动奖励 | 有 | 无 | 有 | 无 |

use mailbox_shared::timestamp;
use serde::{Deserialize, Serialize};

use super::Attachment;
use crate::error::{MailboxError, Result};

/// 活动奖励未指定过期时间时的默认有效年数
pub const CAMPAIGN_DEFAULT_LIFETIME_YEARS: i64 = 30;

/// 消息领取状态
///
/// 只允许 UNCLAIMED -> CLAIMED 单向转换
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    #[default]
    Unclaimed,
    Claimed,
}

/// 校验场景
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// 管理员直发，收件人由调用方另行指定
    Direct,
    /// 批量发送，每条消息自带收件人
    Bulk,
    /// 全局消息目录
    Global,
    /// 活动奖励模板
    Campaign,
}

/// 编辑前的消息快照
///
/// 只包含内容字段，不包含 previous_versions，因此审计链天然只有一层。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSnapshot {
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub expiration: i64,
    pub visible_from: i64,
    pub icon: String,
    pub banner: String,
    pub internal_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub for_accounts_before: Option<i64>,
    /// 被替换的时间
    pub replaced_at: i64,
}

/// 邮箱消息
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase", default)]
pub struct Message {
    pub id: String,
    #[serde(rename = "accountId", skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_message_id: Option<String>,
    pub subject: String,
    pub body: String,
    #[sqlx(json)]
    pub attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub timestamp: i64,
    pub expiration: i64,
    pub visible_from: i64,
    pub icon: String,
    pub banner: String,
    pub status: MessageStatus,
    pub internal_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub for_accounts_before: Option<i64>,
    #[serde(rename = "claimCode", skip_serializing_if = "Option::is_none")]
    pub promo_code: Option<String>,
    #[serde(rename = "minimumAgeInSeconds")]
    pub minimum_account_age: i64,
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_on: Option<i64>,
    #[sqlx(json)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub previous_versions: Vec<MessageSnapshot>,
}

/// 秒/毫秒时间戳归一化
///
/// 13 位视为毫秒并除以 1000，10 位视为秒原样返回，0 表示未设置，其余均为非法。
pub fn normalize_timestamp(field: &'static str, value: i64) -> Result<i64> {
    const SECONDS: std::ops::RangeInclusive<i64> = 1_000_000_000..=9_999_999_999;
    const MILLIS: std::ops::RangeInclusive<i64> = 1_000_000_000_000..=9_999_999_999_999;

    match value {
        0 => Ok(0),
        v if SECONDS.contains(&v) => Ok(v),
        v if MILLIS.contains(&v) => Ok(v / 1000),
        v => Err(MailboxError::InvalidTimestamp { field, value: v }),
    }
}

impl Message {
    /// 生成新的消息 ID
    pub fn new_id() -> String {
        uuid::Uuid::now_v7().to_string()
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expiration <= now
    }

    pub fn is_visible_at(&self, now: i64) -> bool {
        self.visible_from < now
    }

    /// 可见且未过期
    pub fn is_live_at(&self, now: i64) -> bool {
        self.is_visible_at(now) && !self.is_expired_at(now)
    }

    pub fn is_claimed(&self) -> bool {
        self.status == MessageStatus::Claimed
    }

    /// 校验并归一化时间戳
    ///
    /// 字段错误会全部收集后一次性返回；时间戳格式错误和批量消息缺少收件人直接返回对应错误码。
    pub fn validate(&mut self, kind: MessageKind) -> Result<()> {
        if kind == MessageKind::Bulk
            && self
                .recipient
                .as_deref()
                .is_none_or(|r| r.trim().is_empty())
        {
            return Err(MailboxError::RequiredFieldMissing("accountId"));
        }

        self.timestamp = normalize_timestamp("timestamp", self.timestamp)?;
        self.expiration = normalize_timestamp("expiration", self.expiration)?;
        self.visible_from = normalize_timestamp("visibleFrom", self.visible_from)?;
        if let Some(cutoff) = self.for_accounts_before {
            self.for_accounts_before =
                Some(normalize_timestamp("forAccountsBefore", cutoff)?).filter(|t| *t > 0);
        }

        let mut errors = Vec::new();
        if self.subject.trim().is_empty() {
            errors.push("A subject must be provided.".to_string());
        }
        if self.body.trim().is_empty() {
            errors.push("A body must be provided.".to_string());
        }
        for attachment in &self.attachments {
            attachment.validate(&mut errors);
        }
        if self.minimum_account_age < 0 {
            errors.push("minimumAgeInSeconds must not be negative.".to_string());
        }

        if kind == MessageKind::Campaign {
            if self
                .promo_code
                .as_deref()
                .is_none_or(|c| c.trim().is_empty())
            {
                errors.push("A claim code must be provided.".to_string());
            }
            if self.attachments.is_empty() {
                errors.push("Campaign rewards must have at least one attachment".to_string());
            }
            if self.expiration == 0 {
                self.expiration = timestamp::in_the_future_years(CAMPAIGN_DEFAULT_LIFETIME_YEARS);
            }
        } else if self.expiration == 0 {
            errors.push("An expiration must be provided.".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(MailboxError::Validation(errors))
        }
    }

    /// 新建前重置服务端字段
    ///
    /// 客户端提交的状态、领取时间和审计链一律忽略。
    pub fn prepare_new(&mut self, now: i64) {
        if self.id.trim().is_empty() {
            self.id = Self::new_id();
        }
        if self.timestamp == 0 {
            self.timestamp = now;
        }
        self.status = MessageStatus::Unclaimed;
        self.claimed_on = None;
        self.previous_versions.clear();
    }

    /// 清除只属于活动奖励和全局消息目录的字段
    ///
    /// 直发消息携带的活动码会被当作已兑换记录，必须在投递前清掉。
    pub fn clear_campaign_fields(&mut self) {
        self.promo_code = None;
        self.minimum_account_age = 0;
        self.redirect_url = None;
        self.global_message_id = None;
        self.for_accounts_before = None;
    }

    /// 为指定账号复制一份独立的消息（直发、活动奖励）
    pub fn instantiate_for(&self, account_id: &str, now: i64) -> Message {
        Message {
            id: Self::new_id(),
            recipient: Some(account_id.to_string()),
            global_message_id: None,
            timestamp: now,
            status: MessageStatus::Unclaimed,
            for_accounts_before: None,
            claimed_on: None,
            previous_versions: Vec::new(),
            ..self.clone()
        }
    }

    /// 将全局消息物化为指定账号的副本
    pub fn materialize_for(&self, account_id: &str) -> Message {
        Message {
            id: Self::new_id(),
            recipient: Some(account_id.to_string()),
            global_message_id: Some(self.id.clone()),
            status: MessageStatus::Unclaimed,
            for_accounts_before: None,
            promo_code: None,
            claimed_on: None,
            previous_versions: Vec::new(),
            ..self.clone()
        }
    }

    /// 当前内容快照
    pub fn snapshot(&self, replaced_at: i64) -> MessageSnapshot {
        MessageSnapshot {
            subject: self.subject.clone(),
            body: self.body.clone(),
            attachments: self.attachments.clone(),
            data: self.data.clone(),
            expiration: self.expiration,
            visible_from: self.visible_from,
            icon: self.icon.clone(),
            banner: self.banner.clone(),
            internal_note: self.internal_note.clone(),
            for_accounts_before: self.for_accounts_before,
            replaced_at,
        }
    }

    /// 修改前保存当前版本
    pub fn record_previous_version(&mut self, now: i64) {
        let snapshot = self.snapshot(now);
        self.previous_versions.push(snapshot);
    }

    /// 用编辑内容覆盖可编辑字段
    ///
    /// 身份、收件人、领取状态和审计链不受影响。
    pub fn apply_edit(&mut self, edited: &Message) {
        self.subject = edited.subject.clone();
        self.body = edited.body.clone();
        self.attachments = edited.attachments.clone();
        self.data = edited.data.clone();
        self.expiration = edited.expiration;
        self.visible_from = edited.visible_from;
        self.icon = edited.icon.clone();
        self.banner = edited.banner.clone();
        self.internal_note = edited.internal_note.clone();
        if self.recipient.is_none() {
            self.for_accounts_before = edited.for_accounts_before;
        }
    }
}
