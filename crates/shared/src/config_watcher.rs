//! 配置热更新模块
//!
//! 提供 `ConfigWatcher` trait 和基于文件系统事件的实现，支持运行时动态更新配置。
//!
//! 各服务通过 `DynamicConfig` 持有 `Arc<ArcSwap<AppConfig>>`，
//! 读取几乎无开销（一次原子 load），写入通过 watcher 回调自动触发。
//! 清理任务的间隔、保留缓冲期以及领取模式开关都从这里读取。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::{AppConfig, MailboxSettings};

/// 配置监听器抽象
#[async_trait]
pub trait ConfigWatcher: Send + Sync {
    /// 启动监听，配置变更时推送到 DynamicConfig
    async fn start(&self) -> Result<()>;

    /// 停止监听并释放资源
    async fn stop(&self) -> Result<()>;
}

/// 动态配置容器
///
/// 使用 `ArcSwap` 实现近零开销的读取，
/// 配合 `watch` channel 让消费方异步等待配置变更通知。
#[derive(Clone)]
pub struct DynamicConfig {
    current: Arc<ArcSwap<AppConfig>>,
    tx: watch::Sender<Arc<AppConfig>>,
    rx: watch::Receiver<Arc<AppConfig>>,
}

impl DynamicConfig {
    /// 用初始配置创建 DynamicConfig
    pub fn new(config: AppConfig) -> Self {
        let config = Arc::new(config);
        let (tx, rx) = watch::channel(config.clone());
        Self {
            current: Arc::new(ArcSwap::from(config)),
            tx,
            rx,
        }
    }

    /// 获取当前配置快照
    pub fn load(&self) -> Arc<AppConfig> {
        self.current.load_full()
    }

    /// 当前邮箱业务配置
    pub fn mailbox(&self) -> MailboxSettings {
        self.current.load().mailbox.clone()
    }

    /// 获取 watch receiver，用于异步等待配置变更
    pub fn subscribe(&self) -> watch::Receiver<Arc<AppConfig>> {
        self.rx.clone()
    }

    /// 更新配置
    ///
    /// 同时更新 ArcSwap 快照和 watch channel，
    /// 保证 load() 读取和 subscribe() 通知的一致性。
    pub fn update(&self, new_config: AppConfig) {
        let new_config = Arc::new(new_config);
        self.current.store(new_config.clone());
        // 没有 receiver 时 send 失败，属于正常情况
        let _ = self.tx.send(new_config);
    }
}

impl Default for DynamicConfig {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

/// 基于文件系统事件的配置监听器
///
/// 使用 `notify` crate 监听配置目录，文件写入后经 debounce 窗口去抖再重新加载。
pub struct FileConfigWatcher {
    service_name: String,
    watch_path: PathBuf,
    debounce: Duration,
    dynamic_config: DynamicConfig,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl FileConfigWatcher {
    pub fn new(
        service_name: &str,
        watch_path: impl AsRef<Path>,
        debounce: Duration,
        dynamic_config: DynamicConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            service_name: service_name.to_string(),
            watch_path: watch_path.as_ref().to_path_buf(),
            debounce,
            dynamic_config,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// 监听默认配置目录（CONFIG_DIR）
    pub fn for_config_dir(service_name: &str, dynamic_config: DynamicConfig) -> Self {
        Self::new(
            service_name,
            AppConfig::config_dir(),
            Duration::from_millis(2_000),
            dynamic_config,
        )
    }
}

#[async_trait]
impl ConfigWatcher for FileConfigWatcher {
    async fn start(&self) -> Result<()> {
        use notify::{RecursiveMode, Watcher};

        let watch_path = self.watch_path.clone();
        let debounce = self.debounce;
        let service_name = self.service_name.clone();
        let dynamic_config = self.dynamic_config.clone();
        let mut shutdown_rx = self.shutdown_rx.clone();

        let (event_tx, mut event_rx) = tokio::sync::mpsc::channel::<()>(16);

        // notify 使用系统原生 API，watcher 在阻塞线程中创建
        let watcher = tokio::task::spawn_blocking(move || -> Result<notify::RecommendedWatcher> {
            let mut watcher =
                notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                    match res {
                        Ok(event) => {
                            use notify::EventKind;
                            if matches!(
                                event.kind,
                                EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                            ) {
                                let _ = event_tx.try_send(());
                            }
                        }
                        Err(e) => warn!(error = %e, "config watcher event error"),
                    }
                })
                .context("创建文件监听器失败")?;

            watcher
                .watch(&watch_path, RecursiveMode::NonRecursive)
                .context("启动文件监听失败")?;

            info!(path = %watch_path.display(), "config watcher started");
            Ok(watcher)
        })
        .await
        .context("文件监听线程异常退出")??;

        tokio::spawn(async move {
            // watcher 被 drop 后监听即停止，因此随循环一起持有
            let _watcher = watcher;
            loop {
                tokio::select! {
                    Some(()) = event_rx.recv() => {
                        tokio::time::sleep(debounce).await;
                        while event_rx.try_recv().is_ok() {}

                        match AppConfig::load(&service_name) {
                            Ok(new_config) => {
                                info!(service = %service_name, "config reloaded");
                                dynamic_config.update(new_config);
                            }
                            Err(e) => {
                                error!(
                                    service = %service_name,
                                    error = %e,
                                    "config reload failed, keeping current config"
                                );
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("config watcher stopped");
                            break;
                        }
                    }
                }
            }
        });

        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_config_load_and_update() {
        let dc = DynamicConfig::new(AppConfig::default());
        assert_eq!(dc.mailbox().retention_buffer_seconds, 604_800);

        let mut updated = AppConfig::default();
        updated.mailbox.retention_buffer_seconds = 10;
        updated.mailbox.guid_campaign_format = true;
        dc.update(updated);

        assert_eq!(dc.mailbox().retention_buffer_seconds, 10);
        assert!(dc.load().mailbox.guid_campaign_format);
    }

    #[test]
    fn test_dynamic_config_subscribe() {
        let dc = DynamicConfig::default();
        let mut rx = dc.subscribe();
        assert_eq!(rx.borrow().server.port, 8080);

        let mut updated = AppConfig::default();
        updated.server.port = 3000;
        dc.update(updated);
        assert_eq!(rx.borrow_and_update().server.port, 3000);
    }
}
