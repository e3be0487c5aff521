//! 数据访问层
//!
//! PostgreSQL 仓储实现。messages、message_history、global_messages、campaigns
//! 四张表共用同一列结构，绑定与列清单集中在这里维护。

mod campaign_repo;
mod global_message_repo;
mod inbox_repo;
mod message_repo;
mod pairing_repo;
mod traits;

pub use campaign_repo::CampaignRepository;
pub use global_message_repo::GlobalMessageRepository;
pub use inbox_repo::InboxRepository;
pub use message_repo::MessageRepository;
pub use pairing_repo::PairingRepository;
pub use traits::*;

use sqlx::Postgres;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::types::Json;

use crate::models::Message;

/// 消息表列清单（查询与写入共用同一顺序）
pub(crate) const MESSAGE_COLUMNS: &str = "id, recipient, global_message_id, subject, body, \
     attachments, data, timestamp, expiration, visible_from, icon, banner, status, \
     internal_note, for_accounts_before, promo_code, minimum_account_age, redirect_url, \
     claimed_on, previous_versions";

/// 与 `MESSAGE_COLUMNS` 对应的占位符
pub(crate) const MESSAGE_PLACEHOLDERS: &str =
    "$1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20";

pub(crate) fn insert_message_sql(table: &str) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table, MESSAGE_COLUMNS, MESSAGE_PLACEHOLDERS
    )
}

/// 按 `MESSAGE_COLUMNS` 的顺序绑定整条消息
pub(crate) fn bind_message<'q>(
    query: Query<'q, Postgres, PgArguments>,
    message: &'q Message,
) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(&message.id)
        .bind(&message.recipient)
        .bind(&message.global_message_id)
        .bind(&message.subject)
        .bind(&message.body)
        .bind(Json(&message.attachments))
        .bind(&message.data)
        .bind(message.timestamp)
        .bind(message.expiration)
        .bind(message.visible_from)
        .bind(&message.icon)
        .bind(&message.banner)
        .bind(message.status)
        .bind(&message.internal_note)
        .bind(message.for_accounts_before)
        .bind(&message.promo_code)
        .bind(message.minimum_account_age)
        .bind(&message.redirect_url)
        .bind(message.claimed_on)
        .bind(Json(&message.previous_versions))
}
