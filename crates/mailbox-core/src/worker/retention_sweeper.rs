//! 过期消息清理 Worker
//!
//! 物理删除过期时间早于 `now - retention_buffer_seconds` 的消息、历史和全局消息目录。
//! 只按过期时间判断，已领取但未过期的消息不会被删除。
//! 指向仍在目录中的全局消息的历史会保留，作为该账号已物化过的记录。
//! 三张表各自独立清理，一张表失败不影响其余两张。
//! 保留缓冲期和执行间隔每轮从动态配置读取。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use mailbox_shared::config_watcher::DynamicConfig;
use mailbox_shared::observability::metrics;
use mailbox_shared::timestamp;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::repository::{GlobalMessageRepositoryTrait, MessageRepositoryTrait};

/// 单轮清理结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub messages: u64,
    pub history: u64,
    pub global_messages: u64,
    /// 本轮失败的清理步骤数
    pub failed: usize,
}

impl SweepReport {
    pub fn total(&self) -> u64 {
        self.messages + self.history + self.global_messages
    }
}

/// 过期消息清理 Worker
pub struct RetentionSweeper {
    messages: Arc<dyn MessageRepositoryTrait>,
    globals: Arc<dyn GlobalMessageRepositoryTrait>,
    config: DynamicConfig,
}

impl RetentionSweeper {
    pub fn new(
        messages: Arc<dyn MessageRepositoryTrait>,
        globals: Arc<dyn GlobalMessageRepositoryTrait>,
        config: DynamicConfig,
    ) -> Self {
        Self {
            messages,
            globals,
            config,
        }
    }

    /// 主循环：持续清理直到进程退出
    pub async fn run(&self) {
        info!(
            interval_seconds = self.config.mailbox().sweep_interval_seconds,
            retention_buffer_seconds = self.config.mailbox().retention_buffer_seconds,
            "RetentionSweeper 已启动"
        );

        loop {
            let report = self.tick(timestamp::now()).await;
            if report.failed > 0 {
                warn!(failed = report.failed, "过期消息清理部分失败，下轮重试");
            }

            let interval = self.config.mailbox().sweep_interval_seconds.max(1);
            tokio::time::sleep(Duration::from_secs(interval)).await;
        }
    }

    /// 执行一轮清理
    pub async fn tick(&self, now: i64) -> SweepReport {
        let cutoff = now - self.config.mailbox().retention_buffer_seconds;

        let messages = purge("messages", self.messages.purge_expired(cutoff)).await;
        let history = purge("message_history", self.messages.purge_history(cutoff)).await;
        let global_messages =
            purge("global_messages", self.globals.purge_expired_globals(cutoff)).await;

        let report = SweepReport {
            messages: messages.unwrap_or_default(),
            history: history.unwrap_or_default(),
            global_messages: global_messages.unwrap_or_default(),
            failed: [messages, history, global_messages]
                .iter()
                .filter(|step| step.is_none())
                .count(),
        };

        if report.total() > 0 {
            info!(
                messages = report.messages,
                history = report.history,
                global_messages = report.global_messages,
                cutoff,
                "已删除过期的邮箱消息"
            );
        }
        report
    }
}

async fn purge(collection: &'static str, step: impl Future<Output = Result<u64>>) -> Option<u64> {
    match step.await {
        Ok(deleted) => {
            metrics::record_sweep_deleted(collection, deleted);
            Some(deleted)
        }
        Err(e) => {
            error!(collection, error = %e, "过期消息清理出错");
            None
        }
    }
}
