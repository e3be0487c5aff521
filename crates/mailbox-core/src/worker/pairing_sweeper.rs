//! 过期领取链接清理 Worker

use std::sync::Arc;
use std::time::Duration;

use mailbox_shared::config_watcher::DynamicConfig;
use mailbox_shared::observability::metrics;
use mailbox_shared::timestamp;
use tracing::{error, info};

use crate::error::Result;
use crate::repository::PairingRepositoryTrait;

/// 过期领取链接清理 Worker
pub struct PairingSweeper {
    pairings: Arc<dyn PairingRepositoryTrait>,
    config: DynamicConfig,
}

impl PairingSweeper {
    pub fn new(pairings: Arc<dyn PairingRepositoryTrait>, config: DynamicConfig) -> Self {
        Self { pairings, config }
    }

    pub async fn run(&self) {
        info!(
            interval_seconds = self.config.mailbox().pairing_sweep_interval_seconds,
            "PairingSweeper 已启动"
        );

        loop {
            if let Err(e) = self.tick(timestamp::now()).await {
                error!(error = %e, "过期领取链接清理出错");
            }

            let interval = self.config.mailbox().pairing_sweep_interval_seconds.max(1);
            tokio::time::sleep(Duration::from_secs(interval)).await;
        }
    }

    pub async fn tick(&self, now: i64) -> Result<u64> {
        let deleted = self.pairings.delete_expired_pairings(now).await?;
        metrics::record_sweep_deleted("promo_pairings", deleted);
        if deleted > 0 {
            info!(deleted, "已删除过期的领取链接");
        }
        Ok(deleted)
    }
}
