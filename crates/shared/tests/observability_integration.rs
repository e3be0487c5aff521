//! 共享基础设施集成测试
//!
//! 覆盖 HTTP 中间件链路与动态配置通知，不依赖外部服务。

use axum::{Extension, Router, body::Body, http::Request, middleware, routing::get};
use mailbox_shared::config::AppConfig;
use mailbox_shared::config_watcher::DynamicConfig;
use mailbox_shared::observability::metrics;
use mailbox_shared::observability::middleware::{RequestId, http_tracing, request_id};
use tower::ServiceExt;

async fn echo_request_id(Extension(id): Extension<RequestId>) -> String {
    id.as_str().to_string()
}

fn app() -> Router {
    Router::new()
        .route("/echo", get(echo_request_id))
        .layer(middleware::from_fn(http_tracing))
        .layer(middleware::from_fn(request_id))
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/echo")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-request-id"], "req-123");
}

#[tokio::test]
async fn test_request_id_is_generated_when_missing() {
    let response = app()
        .oneshot(Request::builder().uri("/echo").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let generated = response.headers()["x-request-id"].to_str().unwrap();
    assert_eq!(generated.len(), 36);
}

#[tokio::test]
async fn test_tracing_middleware_keeps_status() {
    let response = app()
        .oneshot(Request::builder().uri("/missing").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    assert!(response.headers().contains_key("x-request-id"));
}

#[test]
fn test_business_metrics_without_recorder() {
    metrics::record_materialized("global", 3);
    metrics::record_claims("bulk", 2);
    metrics::record_sweep_deleted("messages", 0);
    metrics::record_campaign_redemption("redeemed");
    assert!(metrics::get_handle().is_none());
}

#[test]
fn test_dynamic_config_notifies_subscribers() {
    let dynamic = DynamicConfig::default();
    let mut rx = dynamic.subscribe();

    let mut updated = AppConfig::default();
    updated.mailbox.sweep_interval_seconds = 5;
    dynamic.update(updated);

    tokio_test::block_on(async {
        rx.changed().await.unwrap();
    });
    assert_eq!(rx.borrow().mailbox.sweep_interval_seconds, 5);
    assert_eq!(dynamic.mailbox().sweep_interval_seconds, 5);
}
