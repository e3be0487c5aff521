//! 领取链接服务

use std::sync::Arc;

use mailbox_shared::timestamp;
use tracing::{info, instrument};

use crate::error::{MailboxError, Result};
use crate::models::{GuidPairing, normalize_timestamp};
use crate::repository::PairingRepositoryTrait;

/// 领取链接服务
pub struct PairingService {
    pairings: Arc<dyn PairingRepositoryTrait>,
}

impl PairingService {
    pub fn new(pairings: Arc<dyn PairingRepositoryTrait>) -> Self {
        Self { pairings }
    }

    /// 为账号生成一组领取链接，同账号同码的旧链接会被替换
    #[instrument(skip(self, promo_codes), fields(codes = promo_codes.len()))]
    pub async fn generate(
        &self,
        account_id: &str,
        expiration: i64,
        promo_codes: &[String],
    ) -> Result<Vec<GuidPairing>> {
        if account_id.trim().is_empty() {
            return Err(MailboxError::RequiredFieldMissing("accountId"));
        }

        let mut codes: Vec<&str> = promo_codes
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();
        codes.sort_unstable();
        codes.dedup();
        if codes.is_empty() {
            return Err(MailboxError::RequiredFieldMissing("promoCodes"));
        }

        let expiration = normalize_timestamp("expiration", expiration)?;
        if expiration <= timestamp::now() {
            return Err(MailboxError::Validation(vec![
                "expiration must be in the future.".to_string(),
            ]));
        }

        let pairings: Vec<GuidPairing> = codes
            .iter()
            .map(|code| GuidPairing::new(account_id, code, expiration))
            .collect();

        let replaced = self.pairings.replace_pairings(account_id, &pairings).await?;
        info!(account_id, generated = pairings.len(), replaced, "领取链接已生成");

        Ok(pairings)
    }
}
