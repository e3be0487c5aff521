//! 活动奖励服务
//!
//! 兑换流程：
//!
//! ```text
//! 领取码 -> 活动模板有效 -> 账号注册时间满足 -> 未兑换过 -> 写入奖励消息 -> 删除领取链接
//! ```
//!
//! 两种兑换模式由配置切换：GUID 模式使用预发放的一次性领取链接；
//! 直领模式使用调用方提供的账号 ID 与活动码，账号 ID 需符合格式。

use std::collections::HashSet;
use std::sync::Arc;

use mailbox_shared::observability::metrics;
use mailbox_shared::timestamp;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::error::{MailboxError, Result};
use crate::models::{GuidPairing, Message, MessageKind};
use crate::repository::{CampaignRepositoryTrait, MessageRepositoryTrait, PairingRepositoryTrait};
use crate::service::InboxService;

/// 账号 ID 格式：24 位十六进制
const ACCOUNT_ID_PATTERN: &str = r"^[0-9a-fA-F]{24}$";

/// 活动奖励服务
pub struct CampaignService {
    campaigns: Arc<dyn CampaignRepositoryTrait>,
    pairings: Arc<dyn PairingRepositoryTrait>,
    messages: Arc<dyn MessageRepositoryTrait>,
    inbox_service: Arc<InboxService>,
    account_id_regex: Regex,
}

impl CampaignService {
    pub fn new(
        campaigns: Arc<dyn CampaignRepositoryTrait>,
        pairings: Arc<dyn PairingRepositoryTrait>,
        messages: Arc<dyn MessageRepositoryTrait>,
        inbox_service: Arc<InboxService>,
    ) -> Self {
        Self {
            campaigns,
            pairings,
            messages,
            inbox_service,
            account_id_regex: Regex::new(ACCOUNT_ID_PATTERN).expect("account id pattern is valid"),
        }
    }

    /// 定义或替换活动模板
    ///
    /// 整批校验通过才会写入；同码旧模板在同一事务内被替换。
    #[instrument(skip(self, campaigns), fields(count = campaigns.len()))]
    pub async fn define(
        &self,
        campaigns: Vec<Message>,
        default_lifetime_years: i64,
    ) -> Result<Vec<Message>> {
        if campaigns.is_empty() {
            return Err(MailboxError::RequiredFieldMissing("campaigns"));
        }

        let now = timestamp::now();
        let mut errors = Vec::new();
        let mut codes = HashSet::new();
        let mut prepared = Vec::with_capacity(campaigns.len());

        for (index, mut campaign) in campaigns.into_iter().enumerate() {
            if campaign.expiration == 0 {
                campaign.expiration = timestamp::in_the_future_years(default_lifetime_years);
            }
            match campaign.validate(MessageKind::Campaign) {
                Ok(()) => {}
                Err(MailboxError::Validation(list)) => {
                    errors.extend(list.into_iter().map(|e| format!("campaigns[{}]: {}", index, e)));
                    continue;
                }
                Err(e) => return Err(e),
            }

            let code = campaign.promo_code.clone().unwrap_or_default();
            if !codes.insert(code.clone()) {
                return Err(MailboxError::DuplicateKey(format!("promo_code={}", code)));
            }

            campaign.id = Message::new_id();
            campaign.recipient = None;
            campaign.global_message_id = None;
            campaign.for_accounts_before = None;
            campaign.prepare_new(now);
            prepared.push(campaign);
        }

        if !errors.is_empty() {
            return Err(MailboxError::Validation(errors));
        }

        let replaced = self.campaigns.replace_campaigns(&prepared).await?;
        info!(defined = prepared.len(), replaced, "活动奖励模板已定义");

        Ok(prepared)
    }

    /// 活动码对应的有效模板
    pub async fn from_claim_code(&self, promo_code: &str) -> Result<Message> {
        self.campaigns
            .find_active_campaign(promo_code, timestamp::now())
            .await?
            .ok_or_else(|| MailboxError::CampaignNotFound(promo_code.to_string()))
    }

    /// 领取链接必须存在且未过期
    pub async fn enforce_valid_code(&self, guid: &str) -> Result<GuidPairing> {
        self.pairings
            .find_valid_pairing(guid, timestamp::now())
            .await?
            .ok_or_else(|| MailboxError::PairingNotFound(guid.to_string()))
    }

    /// 账号不能已经拥有该活动码的奖励
    pub async fn enforce_promo_unclaimed(&self, account_id: &str, promo_code: &str) -> Result<()> {
        if self.messages.has_promo(account_id, promo_code).await? {
            return Err(MailboxError::PromoAlreadyRedeemed {
                account_id: account_id.to_string(),
                promo_code: promo_code.to_string(),
            });
        }
        Ok(())
    }

    /// 直领模式：账号 ID + 活动码
    #[instrument(skip(self))]
    pub async fn claim_with_account_id(&self, account_id: &str, promo_code: &str) -> Result<Message> {
        if !self.account_id_regex.is_match(account_id) {
            return Err(MailboxError::InvalidAccountId(account_id.to_string()));
        }
        if promo_code.trim().is_empty() {
            return Err(MailboxError::RequiredFieldMissing("promoCode"));
        }

        self.redeem(account_id, promo_code).await
    }

    /// GUID 模式：使用预发放的领取链接，成功后删除链接
    #[instrument(skip(self))]
    pub async fn claim_with_guid(&self, guid: &str) -> Result<Message> {
        let pairing = self.enforce_valid_code(guid).await?;
        let message = self.redeem(&pairing.account_id, &pairing.promo_code).await?;

        match self.pairings.delete_pairing(&pairing.id).await {
            Ok(_) => {}
            Err(e) => warn!(guid, error = %e, "删除已使用的领取链接失败"),
        }

        Ok(message)
    }

    async fn redeem(&self, account_id: &str, promo_code: &str) -> Result<Message> {
        let result = self.try_redeem(account_id, promo_code).await;
        match &result {
            Ok(message) => {
                metrics::record_campaign_redemption("granted");
                info!(account_id, promo_code, message_id = %message.id, "活动奖励已发放");
            }
            Err(e) if e.is_business_error() => {
                metrics::record_campaign_redemption("rejected");
                info!(account_id, promo_code, reason = e.error_code(), "活动奖励兑换被拒绝");
            }
            Err(_) => metrics::record_campaign_redemption("error"),
        }
        result
    }

    async fn try_redeem(&self, account_id: &str, promo_code: &str) -> Result<Message> {
        let campaign = self.from_claim_code(promo_code).await?;
        self.inbox_service
            .enforce_account_age_over(account_id, campaign.minimum_account_age)
            .await?;
        self.enforce_promo_unclaimed(account_id, promo_code).await?;

        let message = campaign.instantiate_for(account_id, timestamp::now());
        match self.messages.deliver(std::slice::from_ref(&message)).await {
            Ok(_) => {}
            // 并发兑换被历史表唯一索引拦截
            Err(MailboxError::DuplicateKey(_)) => {
                return Err(MailboxError::PromoAlreadyRedeemed {
                    account_id: account_id.to_string(),
                    promo_code: promo_code.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
        metrics::record_materialized("campaign", 1);

        Ok(message)
    }
}
