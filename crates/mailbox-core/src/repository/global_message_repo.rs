//! 全局消息目录仓储

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;

use super::traits::GlobalMessageRepositoryTrait;
use super::{MESSAGE_COLUMNS, bind_message, insert_message_sql};
use crate::error::{MailboxError, Result};
use crate::models::Message;

/// 全局消息目录仓储
///
/// 目录是全局消息的唯一真实来源，副本只在调和时按需物化。
pub struct GlobalMessageRepository {
    pool: PgPool,
}

impl GlobalMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_globals(&self) -> Result<Vec<Message>> {
        let sql = format!(
            "SELECT {} FROM global_messages ORDER BY expiration ASC, id ASC",
            MESSAGE_COLUMNS
        );
        let globals = sqlx::query_as::<_, Message>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(globals)
    }

    pub async fn list_active_globals(&self, now: i64) -> Result<Vec<Message>> {
        let sql = format!(
            r#"
            SELECT {} FROM global_messages
            WHERE visible_from < $1 AND expiration > $1
            ORDER BY expiration ASC, id ASC
            "#,
            MESSAGE_COLUMNS
        );
        let globals = sqlx::query_as::<_, Message>(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        Ok(globals)
    }

    pub async fn find_global(&self, id: &str) -> Result<Option<Message>> {
        let sql = format!("SELECT {} FROM global_messages WHERE id = $1", MESSAGE_COLUMNS);
        let global = sqlx::query_as::<_, Message>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(global)
    }

    pub async fn insert_global(&self, message: &Message) -> Result<()> {
        let sql = insert_message_sql("global_messages");
        bind_message(sqlx::query(&sql), message)
            .execute(&self.pool)
            .await
            .map_err(|e| MailboxError::from_unique_violation(e, format!("id={}", message.id)))?;

        Ok(())
    }

    pub async fn update_global(&self, message: &Message) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE global_messages SET
                subject = $2, body = $3, attachments = $4, data = $5, expiration = $6,
                visible_from = $7, icon = $8, banner = $9, internal_note = $10,
                for_accounts_before = $11, previous_versions = $12
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
        .bind(message.for_accounts_before)
        .bind(Json(&message.previous_versions))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn purge_expired_globals(&self, cutoff: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM global_messages WHERE expiration <= $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl GlobalMessageRepositoryTrait for GlobalMessageRepository {
    async fn list_globals(&self) -> Result<Vec<Message>> {
        self.list_globals().await
    }

    async fn list_active_globals(&self, now: i64) -> Result<Vec<Message>> {
        self.list_active_globals(now).await
    }

    async fn find_global(&self, id: &str) -> Result<Option<Message>> {
        self.find_global(id).await
    }

    async fn insert_global(&self, message: &Message) -> Result<()> {
        self.insert_global(message).await
    }

    async fn update_global(&self, message: &Message) -> Result<()> {
        self.update_global(message).await
    }

    async fn purge_expired_globals(&self, cutoff: i64) -> Result<u64> {
        self.purge_expired_globals(cutoff).await
    }
}
