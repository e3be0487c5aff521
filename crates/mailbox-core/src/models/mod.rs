//! 邮箱领域模型
//!
//! 所有模型都支持数据库（sqlx）和 JSON（serde）序列化，时间字段统一为 Unix 秒。

mod attachment;
mod inbox;
mod message;
mod pairing;

pub use attachment::Attachment;
pub use inbox::Inbox;
pub use message::{
    CAMPAIGN_DEFAULT_LIFETIME_YEARS, Message, MessageKind, MessageSnapshot, MessageStatus,
    normalize_timestamp,
};
pub use pairing::GuidPairing;
