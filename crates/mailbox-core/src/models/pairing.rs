//! 活动领取链接（GUID pairing）

use serde::{Deserialize, Serialize};

/// 预发放的一次性领取链接
///
/// `id` 即链接中的 GUID。兑换成功后删除，过期后由清理任务删除。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GuidPairing {
    pub id: String,
    pub account_id: String,
    pub promo_code: String,
    pub expiration: i64,
}

impl GuidPairing {
    pub fn new(account_id: &str, promo_code: &str, expiration: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            account_id: account_id.to_string(),
            promo_code: promo_code.to_string(),
            expiration,
        }
    }

    pub fn is_valid_at(&self, now: i64) -> bool {
        self.expiration >= now
    }
}
