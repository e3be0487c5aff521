//! 收件箱仓储

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::traits::InboxRepositoryTrait;
use crate::error::Result;
use crate::models::Inbox;

/// 收件箱仓储
pub struct InboxRepository {
    pool: PgPool,
}

impl InboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 懒创建收件箱
    ///
    /// 插入时 created_on 与 last_accessed 都取 now；已存在时只刷新 last_accessed。
    /// `xmax = 0` 表示本次为插入。
    pub async fn upsert_inbox(&self, account_id: &str, now: i64) -> Result<(Inbox, bool)> {
        let row = sqlx::query(
            r#"
            INSERT INTO inboxes (account_id, created_on, last_accessed)
            VALUES ($1, $2, $2)
            ON CONFLICT (account_id) DO UPDATE SET last_accessed = EXCLUDED.last_accessed
            RETURNING account_id, created_on, last_accessed, (xmax = 0) AS created
            "#,
        )
        .bind(account_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let inbox = Inbox {
            account_id: row.get("account_id"),
            created_on: row.get("created_on"),
            last_accessed: row.get("last_accessed"),
            messages: Vec::new(),
        };
        Ok((inbox, row.get("created")))
    }

    pub async fn find_inbox(&self, account_id: &str) -> Result<Option<Inbox>> {
        let inbox = sqlx::query_as::<_, Inbox>(
            r#"
            SELECT account_id, created_on, last_accessed
            FROM inboxes
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(inbox)
    }

    pub async fn set_created_on(&self, account_id: &str, created_on: i64) -> Result<Option<Inbox>> {
        let inbox = sqlx::query_as::<_, Inbox>(
            r#"
            UPDATE inboxes SET created_on = $2
            WHERE account_id = $1
            RETURNING account_id, created_on, last_accessed
            "#,
        )
        .bind(account_id)
        .bind(created_on)
        .fetch_optional(&self.pool)
        .await?;

        Ok(inbox)
    }
}

#[async_trait]
impl InboxRepositoryTrait for InboxRepository {
    async fn upsert_inbox(&self, account_id: &str, now: i64) -> Result<(Inbox, bool)> {
        self.upsert_inbox(account_id, now).await
    }

    async fn find_inbox(&self, account_id: &str) -> Result<Option<Inbox>> {
        self.find_inbox(account_id).await
    }

    async fn set_created_on(&self, account_id: &str, created_on: i64) -> Result<Option<Inbox>> {
        self.set_created_on(account_id, created_on).await
    }
}
