//! 邮箱数据库连接
//!
//! 连接池按 `[database]` 配置创建；迁移脚本位于工作区根目录 `migrations/`，
//! 是否在启动时执行由 `database.run_migrations` 控制。

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, instrument};

use crate::config::DatabaseConfig;
use crate::error::Result;

/// 邮箱数据库
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 建立连接池，按配置执行迁移
    #[instrument(skip(config), fields(url = %redact_url(&config.url)))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = pool_options(config).connect(&config.url).await?;
        let db = Self { pool };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        info!(
            max_connections = config.max_connections,
            migrated = config.run_migrations,
            "邮箱数据库已就绪"
        );
        Ok(db)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// /health 使用的连通性检查
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("邮箱数据库连接池已关闭");
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections.min(config.max_connections))
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
}

/// 日志中隐藏连接串里的账号密码
fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{}://***@{}", scheme, &rest[at + 1..]),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_url_hides_credentials() {
        assert_eq!(
            redact_url("postgres://mailbox:secret@db:5432/mailbox_db"),
            "postgres://***@db:5432/mailbox_db"
        );
        assert_eq!(
            redact_url("postgres://db:5432/mailbox_db"),
            "postgres://db:5432/mailbox_db"
        );
        assert_eq!(redact_url("not a url"), "not a url");
    }

    #[test]
    fn test_pool_options_follow_config() {
        let config = DatabaseConfig {
            max_connections: 4,
            min_connections: 8,
            connect_timeout_seconds: 5,
            ..Default::default()
        };
        let options = pool_options(&config);
        assert_eq!(options.get_max_connections(), 4);
        assert_eq!(options.get_min_connections(), 4);
        assert_eq!(options.get_acquire_timeout(), Duration::from_secs(5));
    }
}
