//! 收件箱消息仓储
//!
//! messages 保存账号当前的有效消息，message_history 保存每条投递过的消息。
//! 投递时两张表在同一事务内写入；领取、编辑、过期对历史的同步是尽力而为的。

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::warn;

use super::traits::MessageRepositoryTrait;
use super::{MESSAGE_COLUMNS, bind_message, insert_message_sql};
use crate::error::{MailboxError, Result};
use crate::models::Message;

/// 收件箱消息仓储
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ==================== 查询操作 ====================

    /// 账号的全部有效消息（包括尚未可见的），按过期时间升序
    pub async fn list_by_recipient(&self, account_id: &str) -> Result<Vec<Message>> {
        let sql = format!(
            "SELECT {} FROM messages WHERE recipient = $1 ORDER BY expiration ASC, id ASC",
            MESSAGE_COLUMNS
        );
        let messages = sqlx::query_as::<_, Message>(&sql)
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(messages)
    }

    pub async fn find_message(&self, account_id: &str, message_id: &str) -> Result<Option<Message>> {
        let sql = format!(
            "SELECT {} FROM messages WHERE id = $1 AND recipient = $2",
            MESSAGE_COLUMNS
        );
        let message = sqlx::query_as::<_, Message>(&sql)
            .bind(message_id)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(message)
    }

    pub async fn known_global_ids(&self, account_id: &str) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT global_message_id FROM messages
            WHERE recipient = $1 AND global_message_id IS NOT NULL
            UNION
            SELECT global_message_id FROM message_history
            WHERE recipient = $1 AND global_message_id IS NOT NULL
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    pub async fn has_promo(&self, account_id: &str, promo_code: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM messages WHERE recipient = $1 AND promo_code = $2
                UNION ALL
                SELECT 1 FROM message_history WHERE recipient = $1 AND promo_code = $2
            )
            "#,
        )
        .bind(account_id)
        .bind(promo_code)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    // ==================== 写入操作 ====================

    /// 投递消息
    ///
    /// 全局消息副本依赖部分唯一索引 `(recipient, global_message_id)` 去重，冲突的副本直接跳过，
    /// 并发对同一账号的调和不会产生重复。历史表上的活动码唯一索引冲突转换为 `DuplicateKey`。
    pub async fn deliver(&self, messages: &[Message]) -> Result<u64> {
        if messages.is_empty() {
            return Ok(0);
        }

        let insert_live = format!(
            "{} ON CONFLICT (recipient, global_message_id) WHERE global_message_id IS NOT NULL DO NOTHING",
            insert_message_sql("messages")
        );
        let insert_history = format!(
            "{} ON CONFLICT (id) DO NOTHING",
            insert_message_sql("message_history")
        );

        let mut tx = self.pool.begin().await?;
        let mut delivered = 0u64;

        for message in messages {
            let inserted = bind_message(sqlx::query(&insert_live), message)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            if inserted == 0 {
                continue;
            }

            bind_message(sqlx::query(&insert_history), message)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    MailboxError::from_unique_violation(
                        e,
                        format!(
                            "recipient={}, promo_code={}",
                            message.recipient.as_deref().unwrap_or_default(),
                            message.promo_code.as_deref().unwrap_or_default()
                        ),
                    )
                })?;
            delivered += 1;
        }

        tx.commit().await?;
        Ok(delivered)
    }

    /// 原子领取：只有 UNCLAIMED 状态的消息会被更新
    pub async fn claim(&self, account_id: &str, message_id: &str, now: i64) -> Result<Option<Message>> {
        let sql = format!(
            r#"
            UPDATE messages SET status = 'CLAIMED', claimed_on = $3
            WHERE id = $1 AND recipient = $2 AND status = 'UNCLAIMED'
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        );
        let claimed = sqlx::query_as::<_, Message>(&sql)
            .bind(message_id)
            .bind(account_id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        Ok(claimed)
    }

    pub async fn mark_history_claimed(&self, message_id: &str, claimed_on: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE message_history SET status = 'CLAIMED', claimed_on = $2
            WHERE id = $1 AND status = 'UNCLAIMED'
            "#,
        )
        .bind(message_id)
        .bind(claimed_on)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn update_content(&self, message: &Message) -> Result<Option<Message>> {
        let recipient = message.recipient.as_deref().unwrap_or_default();
        let sql = format!(
            r#"
            UPDATE messages SET
                subject = $3, body = $4, attachments = $5, data = $6, expiration = $7,
                visible_from = $8, icon = $9, banner = $10, internal_note = $11,
                previous_versions = $12
            WHERE id = $1 AND recipient = $2
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        );
        let updated = sqlx::query_as::<_, Message>(&sql)
            .bind(&message.id)
            .bind(recipient)
            .bind(&message.subject)
            .bind(&message.body)
            .bind(Json(&message.attachments))
            .bind(&message.data)
            .bind(message.expiration)
            .bind(message.visible_from)
            .bind(&message.icon)
            .bind(&message.banner)
            .bind(&message.internal_note)
            .bind(Json(&message.previous_versions))
            .fetch_optional(&self.pool)
            .await?;

        if updated.is_some() {
            let history = sqlx::query(
                r#"
                UPDATE message_history SET
                    subject = $2, body = $3, attachments = $4, data = $5, expiration = $6,
                    visible_from = $7, icon = $8, banner = $9, internal_note = $10
                WHERE id = $1
                "#,
            )
            .bind(&message.id)
            .bind(&message.subject)
            .bind(&message.body)
            .bind(Json(&message.attachments))
            .bind(&message.data)
            .bind(message.expiration)
            .bind(message.visible_from)
            .bind(&message.icon)
            .bind(&message.banner)
            .bind(&message.internal_note)
            .execute(&self.pool)
            .await;

            if let Err(e) = history {
                warn!(message_id = %message.id, error = %e, "同步消息历史失败");
            }
        }

        Ok(updated)
    }

    pub async fn expire(&self, account_id: &str, message_id: &str, now: i64) -> Result<Option<Message>> {
        let sql = format!(
            "UPDATE messages SET expiration = $3 WHERE id = $1 AND recipient = $2 RETURNING {}",
            MESSAGE_COLUMNS
        );
        let expired = sqlx::query_as::<_, Message>(&sql)
            .bind(message_id)
            .bind(account_id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        if expired.is_some() {
            let history = sqlx::query("UPDATE message_history SET expiration = $2 WHERE id = $1")
                .bind(message_id)
                .bind(now)
                .execute(&self.pool)
                .await;
            if let Err(e) = history {
                warn!(message_id, error = %e, "同步消息历史失败");
            }
        }

        Ok(expired)
    }

    /// 全局消息内容推送到所有副本
    ///
    /// 副本按 global_message_id 匹配，兼容旧数据按 id 匹配。
    /// 这是跨多个收件箱的批量更新，不在同一事务内；历史表失败只记录日志。
    pub async fn propagate_global(&self, global: &Message) -> Result<u64> {
        let affected = self.propagate_into("messages", global).await?;

        if let Err(e) = self.propagate_into("message_history", global).await {
            warn!(global_message_id = %global.id, error = %e, "全局消息同步到历史失败");
        }

        Ok(affected)
    }

    async fn propagate_into(&self, table: &str, global: &Message) -> Result<u64> {
        let sql = format!(
            r#"
            UPDATE {} SET
                subject = $2, global_message_id = $1, attachments = $3, body = $4,
                expiration = $5, visible_from = $6, icon = $7, banner = $8, data = $9,
                internal_note = $10
            WHERE global_message_id = $1 OR id = $1
            "#,
            table
        );
        let result = sqlx::query(&sql)
            .bind(&global.id)
            .bind(&global.subject)
            .bind(Json(&global.attachments))
            .bind(&global.body)
            .bind(global.expiration)
            .bind(global.visible_from)
            .bind(&global.icon)
            .bind(&global.banner)
            .bind(&global.data)
            .bind(&global.internal_note)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // ==================== 删除操作 ====================

    pub async fn delete_expired_for(&self, account_id: &str, now: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM messages WHERE recipient = $1 AND expiration <= $2")
            .bind(account_id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn purge_expired(&self, cutoff: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM messages WHERE expiration <= $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// 清理过期历史
    ///
    /// 指向仍保留在目录中的全局消息的历史会留下，否则下次调和会把管理员已过期的副本重新物化。
    pub async fn purge_history(&self, cutoff: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM message_history h
            WHERE h.expiration <= $1
              AND NOT EXISTS (
                  SELECT 1 FROM global_messages g
                  WHERE g.id = h.global_message_id AND g.expiration > $1
              )
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl MessageRepositoryTrait for MessageRepository {
    async fn list_by_recipient(&self, account_id: &str) -> Result<Vec<Message>> {
        self.list_by_recipient(account_id).await
    }

    async fn find_message(&self, account_id: &str, message_id: &str) -> Result<Option<Message>> {
        self.find_message(account_id, message_id).await
    }

    async fn known_global_ids(&self, account_id: &str) -> Result<Vec<String>> {
        self.known_global_ids(account_id).await
    }

    async fn has_promo(&self, account_id: &str, promo_code: &str) -> Result<bool> {
        self.has_promo(account_id, promo_code).await
    }

    async fn deliver(&self, messages: &[Message]) -> Result<u64> {
        self.deliver(messages).await
    }

    async fn claim(&self, account_id: &str, message_id: &str, now: i64) -> Result<Option<Message>> {
        self.claim(account_id, message_id, now).await
    }

    async fn mark_history_claimed(&self, message_id: &str, claimed_on: i64) -> Result<()> {
        self.mark_history_claimed(message_id, claimed_on).await
    }

    async fn update_content(&self, message: &Message) -> Result<Option<Message>> {
        self.update_content(message).await
    }

    async fn expire(&self, account_id: &str, message_id: &str, now: i64) -> Result<Option<Message>> {
        self.expire(account_id, message_id, now).await
    }

    async fn propagate_global(&self, global: &Message) -> Result<u64> {
        self.propagate_global(global).await
    }

    async fn delete_expired_for(&self, account_id: &str, now: i64) -> Result<u64> {
        self.delete_expired_for(account_id, now).await
    }

    async fn purge_expired(&self, cutoff: i64) -> Result<u64> {
        self.purge_expired(cutoff).await
    }

    async fn purge_history(&self, cutoff: i64) -> Result<u64> {
        self.purge_history(cutoff).await
    }
}
