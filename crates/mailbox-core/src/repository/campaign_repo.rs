//! 活动奖励模板仓储

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

use super::traits::CampaignRepositoryTrait;
use super::{MESSAGE_COLUMNS, bind_message, insert_message_sql};
use crate::error::{MailboxError, Result};
use crate::models::Message;

/// 活动奖励模板仓储，promo_code 唯一
pub struct CampaignRepository {
    pool: PgPool,
}

impl CampaignRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_active_campaign(&self, promo_code: &str, now: i64) -> Result<Option<Message>> {
        let sql = format!(
            r#"
            SELECT {} FROM campaigns
            WHERE promo_code = $1 AND (expiration = 0 OR expiration > $2)
            LIMIT 1
            "#,
            MESSAGE_COLUMNS
        );
        let campaign = sqlx::query_as::<_, Message>(&sql)
            .bind(promo_code)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        Ok(campaign)
    }

    /// 替换活动模板
    ///
    /// 先删除同码旧模板再写入，任何一步失败整体回滚。
    pub async fn replace_campaigns(&self, campaigns: &[Message]) -> Result<u64> {
        let codes: Vec<String> = campaigns
            .iter()
            .filter_map(|c| c.promo_code.clone())
            .collect();
        let insert = insert_message_sql("campaigns");

        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM campaigns WHERE promo_code = ANY($1)")
            .bind(&codes)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        for campaign in campaigns {
            bind_message(sqlx::query(&insert), campaign)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    MailboxError::from_unique_violation(
                        e,
                        format!(
                            "promo_code={}",
                            campaign.promo_code.as_deref().unwrap_or_default()
                        ),
                    )
                })?;
        }

        tx.commit().await?;

        if deleted > 0 {
            info!(count = deleted, "替换已存在的活动奖励模板");
        }
        Ok(deleted)
    }
}

#[async_trait]
impl CampaignRepositoryTrait for CampaignRepository {
    async fn find_active_campaign(&self, promo_code: &str, now: i64) -> Result<Option<Message>> {
        self.find_active_campaign(promo_code, now).await
    }

    async fn replace_campaigns(&self, campaigns: &[Message]) -> Result<u64> {
        self.replace_campaigns(campaigns).await
    }
}
