//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(service_name: &str, metrics_port: u16) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics(service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册指标描述，出现在 /metrics 的 HELP 注释中
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!(
        "mailbox_messages_materialized_total",
        "Messages written into inboxes, by source"
    );
    metrics::describe_counter!("mailbox_claims_total", "Messages marked claimed, by mode");
    metrics::describe_counter!(
        "mailbox_sweep_deleted_total",
        "Rows removed by background sweepers, by collection"
    );
    metrics::describe_counter!(
        "mailbox_campaign_redemptions_total",
        "Campaign claim attempts, by outcome"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 指标记录函数
// ============================================================================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录写入收件箱的消息数量
///
/// source: global / direct / bulk / campaign
#[inline]
pub fn record_materialized(source: &'static str, count: u64) {
    if count == 0 {
        return;
    }
    metrics::counter!("mailbox_messages_materialized_total", "source" => source).increment(count);
}

/// 记录领取数量，mode: single / all
#[inline]
pub fn record_claims(mode: &'static str, count: u64) {
    if count == 0 {
        return;
    }
    metrics::counter!("mailbox_claims_total", "mode" => mode).increment(count);
}

/// 记录清理任务删除的行数
#[inline]
pub fn record_sweep_deleted(collection: &'static str, count: u64) {
    metrics::counter!("mailbox_sweep_deleted_total", "collection" => collection).increment(count);
}

/// 记录活动兑换结果
#[inline]
pub fn record_campaign_redemption(outcome: &'static str) {
    metrics::counter!("mailbox_campaign_redemptions_total", "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_functions_do_not_panic() {
        // 未安装 recorder 时记录为空操作
        record_http_request("GET", "/inbox", 200, 0.1);
        record_materialized("global", 3);
        record_materialized("direct", 0);
        record_claims("all", 2);
        record_sweep_deleted("messages", 5);
        record_campaign_redemption("granted");
        assert!(get_handle().is_none());
    }
}
