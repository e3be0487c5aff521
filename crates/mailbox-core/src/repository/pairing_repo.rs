//! 领取链接仓储

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

use super::traits::PairingRepositoryTrait;
use crate::error::Result;
use crate::models::GuidPairing;

/// 领取链接仓储
pub struct PairingRepository {
    pool: PgPool,
}

impl PairingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 删除该账号同码旧链接并写入新链接（同一事务）
    pub async fn replace_pairings(&self, account_id: &str, pairings: &[GuidPairing]) -> Result<u64> {
        let codes: Vec<&str> = pairings.iter().map(|p| p.promo_code.as_str()).collect();

        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(
            "DELETE FROM promo_pairings WHERE account_id = $1 AND promo_code = ANY($2)",
        )
        .bind(account_id)
        .bind(&codes)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        for pairing in pairings {
            sqlx::query(
                r#"
                INSERT INTO promo_pairings (id, account_id, promo_code, expiration)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(&pairing.id)
            .bind(&pairing.account_id)
            .bind(&pairing.promo_code)
            .bind(pairing.expiration)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        if deleted > 0 {
            info!(account_id, count = deleted, "删除已存在的领取链接");
        }
        Ok(deleted)
    }

    pub async fn find_valid_pairing(&self, id: &str, now: i64) -> Result<Option<GuidPairing>> {
        let pairing = sqlx::query_as::<_, GuidPairing>(
            r#"
            SELECT id, account_id, promo_code, expiration
            FROM promo_pairings
            WHERE id = $1 AND expiration >= $2
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(pairing)
    }

    pub async fn delete_pairing(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM promo_pairings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_expired_pairings(&self, now: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM promo_pairings WHERE expiration <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl PairingRepositoryTrait for PairingRepository {
    async fn replace_pairings(&self, account_id: &str, pairings: &[GuidPairing]) -> Result<u64> {
        self.replace_pairings(account_id, pairings).await
    }

    async fn find_valid_pairing(&self, id: &str, now: i64) -> Result<Option<GuidPairing>> {
        self.find_valid_pairing(id, now).await
    }

    async fn delete_pairing(&self, id: &str) -> Result<bool> {
        self.delete_pairing(id).await
    }

    async fn delete_expired_pairings(&self, now: i64) -> Result<u64> {
        self.delete_expired_pairings(now).await
    }
}
