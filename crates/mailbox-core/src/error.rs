//! 邮箱服务错误类型
//!
//! 定义服务层的业务错误和系统错误。业务错误按 `ErrorKind` 归类，
//! API 层据此映射 HTTP 状态码。

use thiserror::Error;

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 参数校验失败，未发生任何写入
    Validation,
    /// 消息、收件箱、活动等不存在或已过期
    NotFound,
    /// 重复领取、重复兑换、唯一键冲突
    Conflict,
    /// 业务规则不满足（账号注册时间不足、消息尚未可见）
    Ineligible,
    /// 数据库等系统错误
    System,
}

/// 邮箱服务错误类型
#[derive(Debug, Error)]
pub enum MailboxError {
    // === 校验错误 ===
    #[error("参数校验失败: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("缺少必填字段: {0}")]
    RequiredFieldMissing(&'static str),

    #[error("无效的时间戳: {field}={value}")]
    InvalidTimestamp { field: &'static str, value: i64 },

    #[error("无效的账号 ID: {0}")]
    InvalidAccountId(String),

    // === 不存在 ===
    #[error("收件箱不存在: account_id={0}")]
    InboxNotFound(String),

    #[error("消息不存在: account_id={account_id}, message_id={message_id}")]
    MessageNotFound {
        account_id: String,
        message_id: String,
    },

    #[error("全局消息不存在: {0}")]
    GlobalMessageNotFound(String),

    #[error("活动已过期或不可用: promo_code={0}")]
    CampaignNotFound(String),

    #[error("领取码不存在或已过期: {0}")]
    PairingNotFound(String),

    // === 冲突 ===
    #[error("消息已被领取: message_id={0}")]
    AlreadyClaimed(String),

    #[error("活动奖励已兑换: account_id={account_id}, promo_code={promo_code}")]
    PromoAlreadyRedeemed {
        account_id: String,
        promo_code: String,
    },

    #[error("唯一键冲突: {0}")]
    DuplicateKey(String),

    // === 资格不满足 ===
    #[error("账号注册时间不足: account_id={account_id}, 需要 {required_seconds} 秒")]
    AccountTooYoung {
        account_id: String,
        required_seconds: i64,
    },

    #[error("消息尚未可见: message_id={0}")]
    NotYetVisible(String),

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 邮箱服务 Result 类型别名
pub type Result<T> = std::result::Result<T, MailboxError>;

impl MailboxError {
    /// 错误类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_)
            | Self::RequiredFieldMissing(_)
            | Self::InvalidTimestamp { .. }
            | Self::InvalidAccountId(_) => ErrorKind::Validation,
            Self::InboxNotFound(_)
            | Self::MessageNotFound { .. }
            | Self::GlobalMessageNotFound(_)
            | Self::CampaignNotFound(_)
            | Self::PairingNotFound(_) => ErrorKind::NotFound,
            Self::AlreadyClaimed(_) | Self::PromoAlreadyRedeemed { .. } | Self::DuplicateKey(_) => {
                ErrorKind::Conflict
            }
            Self::AccountTooYoung { .. } | Self::NotYetVisible(_) => ErrorKind::Ineligible,
            Self::Database(_) | Self::Serialization(_) | Self::Internal(_) => ErrorKind::System,
        }
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        self.kind() != ErrorKind::System
    }

    /// 检查是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(sqlx::Error::PoolTimedOut) | Self::Database(sqlx::Error::Io(_))
        )
    }

    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::RequiredFieldMissing(_) => "REQUIRED_FIELD_MISSING",
            Self::InvalidTimestamp { .. } => "INVALID_TIMESTAMP",
            Self::InvalidAccountId(_) => "INVALID_ACCOUNT_ID",
            Self::InboxNotFound(_) => "INBOX_NOT_FOUND",
            Self::MessageNotFound { .. } => "MESSAGE_NOT_FOUND",
            Self::GlobalMessageNotFound(_) => "GLOBAL_MESSAGE_NOT_FOUND",
            Self::CampaignNotFound(_) => "CAMPAIGN_NOT_FOUND",
            Self::PairingNotFound(_) => "PAIRING_NOT_FOUND",
            Self::AlreadyClaimed(_) => "ALREADY_CLAIMED",
            Self::PromoAlreadyRedeemed { .. } => "PROMO_ALREADY_REDEEMED",
            Self::DuplicateKey(_) => "DUPLICATE_KEY",
            Self::AccountTooYoung { .. } => "ACCOUNT_TOO_YOUNG",
            Self::NotYetVisible(_) => "NOT_YET_VISIBLE",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 将唯一约束冲突转换为 `DuplicateKey`，其余数据库错误原样返回
    pub fn from_unique_violation(err: sqlx::Error, key: impl Into<String>) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::DuplicateKey(key.into()),
            _ => Self::Database(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind() {
        assert_eq!(
            MailboxError::Validation(vec!["A subject must be provided.".into()]).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            MailboxError::RequiredFieldMissing("accountId").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            MailboxError::PairingNotFound("abc".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            MailboxError::AlreadyClaimed("m1".into()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            MailboxError::AccountTooYoung {
                account_id: "a".into(),
                required_seconds: 60
            }
            .kind(),
            ErrorKind::Ineligible
        );
        assert_eq!(
            MailboxError::Internal("boom".into()).kind(),
            ErrorKind::System
        );
    }

    #[test]
    fn test_error_is_business_error() {
        assert!(MailboxError::AlreadyClaimed("m1".into()).is_business_error());
        assert!(!MailboxError::Database(sqlx::Error::RowNotFound).is_business_error());
        assert!(!MailboxError::Internal("panic".into()).is_business_error());
    }

    #[test]
    fn test_error_code() {
        assert_eq!(
            MailboxError::RequiredFieldMissing("accountId").error_code(),
            "REQUIRED_FIELD_MISSING"
        );
        assert_eq!(
            MailboxError::InvalidTimestamp {
                field: "expiration",
                value: 123
            }
            .error_code(),
            "INVALID_TIMESTAMP"
        );
        assert_eq!(
            MailboxError::PromoAlreadyRedeemed {
                account_id: "a".into(),
                promo_code: "X".into()
            }
            .error_code(),
            "PROMO_ALREADY_REDEEMED"
        );
    }

    #[test]
    fn test_validation_display_joins_all_errors() {
        let err = MailboxError::Validation(vec![
            "A subject must be provided.".into(),
            "A body must be provided.".into(),
        ]);
        let text = err.to_string();
        assert!(text.contains("subject"));
        assert!(text.contains("body"));
    }

    #[test]
    fn test_is_retryable() {
        assert!(MailboxError::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!MailboxError::AlreadyClaimed("m1".into()).is_retryable());
    }
}
