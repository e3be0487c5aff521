//! 邮箱服务
//!
//! 提供收件箱、全局消息、活动奖励的 REST API，并运行过期清理任务。

use std::sync::Arc;

use mailbox::repository::{GlobalMessageRepository, MessageRepository, PairingRepository};
use mailbox::worker::{PairingSweeper, RetentionSweeper};
use mailbox_api::{AppState, routes};
use mailbox_shared::{
    config::AppConfig,
    config_watcher::{ConfigWatcher, DynamicConfig, FileConfigWatcher},
    database::Database,
    observability,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

const SERVICE_NAME: &str = "mailbox-api";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load(SERVICE_NAME)?;
    let _guard = observability::init(SERVICE_NAME, &config.observability).await?;

    if config.is_production() && config.auth.jwt_secret == AppConfig::default().auth.jwt_secret {
        anyhow::bail!("生产环境必须通过 MAILBOX_AUTH__JWT_SECRET 配置 JWT 密钥");
    }

    info!("Starting {} on {}", SERVICE_NAME, config.server_addr());

    let db = Database::connect(&config.database).await?;

    // 配置热更新：清理间隔、保留缓冲期、领取模式无需重启即可生效
    let dynamic_config = DynamicConfig::new(config.clone());
    let watcher = FileConfigWatcher::for_config_dir(SERVICE_NAME, dynamic_config.clone());
    if let Err(e) = watcher.start().await {
        warn!(error = %e, "配置监听启动失败，使用启动时配置");
    }

    // 启动过期消息清理 Worker
    let retention_sweeper = RetentionSweeper::new(
        Arc::new(MessageRepository::new(db.pool().clone())),
        Arc::new(GlobalMessageRepository::new(db.pool().clone())),
        dynamic_config.clone(),
    );
    tokio::spawn(async move {
        retention_sweeper.run().await;
    });

    // 启动过期领取链接清理 Worker
    let pairing_sweeper = PairingSweeper::new(
        Arc::new(PairingRepository::new(db.pool().clone())),
        dynamic_config.clone(),
    );
    tokio::spawn(async move {
        pairing_sweeper.run().await;
    });

    let state = AppState::postgres(db.clone(), dynamic_config);
    // /claim 由浏览器跳转访问，放开跨域
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = routes::app(state).layer(cors);

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    watcher.stop().await.ok();
    db.close().await;
    info!("Server shutdown complete");

    Ok(())
}

/// 监听关闭信号
///
/// 收到 SIGTERM 或 Ctrl+C 后返回，触发 axum 的优雅关闭流程。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
