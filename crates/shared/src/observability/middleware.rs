//! HTTP 中间件
//!
//! 请求追踪、慢请求分级告警和请求 ID。

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use tracing::{Instrument, error, info_span, warn};

use super::metrics;
use crate::config::ObservabilityConfig;

static SLOW_THRESHOLDS: OnceLock<SlowThresholds> = OnceLock::new();

/// 慢请求分级阈值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlowThresholds {
    pub warn: Duration,
    pub error: Duration,
    pub critical: Duration,
}

impl Default for SlowThresholds {
    fn default() -> Self {
        Self::from(&ObservabilityConfig::default())
    }
}

impl From<&ObservabilityConfig> for SlowThresholds {
    fn from(config: &ObservabilityConfig) -> Self {
        Self {
            warn: Duration::from_millis(config.slow_warn_ms),
            error: Duration::from_millis(config.slow_error_ms),
            critical: Duration::from_millis(config.slow_critical_ms),
        }
    }
}

/// 慢请求级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlowTier {
    Normal,
    Warn,
    Error,
    Critical,
}

impl SlowThresholds {
    pub fn classify(&self, elapsed: Duration) -> SlowTier {
        if elapsed >= self.critical {
            SlowTier::Critical
        } else if elapsed >= self.error {
            SlowTier::Error
        } else if elapsed >= self.warn {
            SlowTier::Warn
        } else {
            SlowTier::Normal
        }
    }
}

/// 设置全局慢请求阈值，只有第一次设置生效
pub fn set_slow_thresholds(thresholds: SlowThresholds) {
    let _ = SLOW_THRESHOLDS.set(thresholds);
}

fn slow_thresholds() -> SlowThresholds {
    SLOW_THRESHOLDS.get().copied().unwrap_or_default()
}

/// HTTP 请求追踪和指标中间件
///
/// 为每个请求创建 span，记录指标，并按耗时分级输出慢请求日志。
///
/// ```ignore
/// let app = Router::new()
///     .route("/inbox", get(get_inbox))
///     .layer(axum::middleware::from_fn(http_tracing));
/// ```
pub async fn http_tracing(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let uri = request.uri().path().to_string();

    let span = info_span!(
        "http_request",
        method = %method,
        uri = %uri,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    );

    let start = Instant::now();
    let response = next.run(request).instrument(span.clone()).await;
    let latency = start.elapsed();
    let status = response.status().as_u16();

    span.record("status", status);
    span.record("latency_ms", latency.as_millis() as i64);

    let latency_ms = latency.as_millis() as u64;
    match slow_thresholds().classify(latency) {
        SlowTier::Normal => {}
        SlowTier::Warn => warn!(%method, %uri, status, latency_ms, "slow request"),
        SlowTier::Error => error!(%method, %uri, status, latency_ms, "very slow request"),
        SlowTier::Critical => {
            error!(%method, %uri, status, latency_ms, critical = true, "critically slow request")
        }
    }

    metrics::record_http_request(&method, &uri, status, latency.as_secs_f64());

    response
}

/// 请求 ID 中间件
///
/// 透传或生成 x-request-id，便于日志关联。
pub async fn request_id(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}

/// 请求 ID 包装类型
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_tiers() {
        let t = SlowThresholds::default();
        assert_eq!(t.classify(Duration::from_millis(10)), SlowTier::Normal);
        assert_eq!(t.classify(Duration::from_millis(500)), SlowTier::Warn);
        assert_eq!(t.classify(Duration::from_millis(1_999)), SlowTier::Warn);
        assert_eq!(t.classify(Duration::from_millis(2_000)), SlowTier::Error);
        assert_eq!(t.classify(Duration::from_secs(31)), SlowTier::Critical);
    }
}
