//! 应用状态定义

use std::sync::Arc;

use mailbox::MailboxServices;
use mailbox::test_utils::MemoryStore;
use mailbox_shared::config::AppConfig;
use mailbox_shared::config_watcher::DynamicConfig;
use mailbox_shared::database::Database;

use crate::auth::JwtVerifier;

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub services: MailboxServices,
    /// 当前配置快照，领取模式开关每次请求读取
    pub config: DynamicConfig,
    pub jwt: Arc<JwtVerifier>,
    /// 健康检查使用；内存模式下为 None
    pub database: Option<Database>,
}

impl AppState {
    pub fn new(services: MailboxServices, config: DynamicConfig, database: Option<Database>) -> Self {
        let jwt = Arc::new(JwtVerifier::new(&config.load().auth));
        Self {
            services,
            config,
            jwt,
            database,
        }
    }

    /// PostgreSQL 仓储
    pub fn postgres(database: Database, config: DynamicConfig) -> Self {
        let services = MailboxServices::postgres(database.pool().clone());
        Self::new(services, config, Some(database))
    }

    /// 内存存储，用于路由测试和本地调试
    pub fn in_memory(store: &MemoryStore, config: AppConfig) -> Self {
        Self::new(store.services(), DynamicConfig::new(config), None)
    }
}
