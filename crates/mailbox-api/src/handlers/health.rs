//! 健康检查

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use crate::state::AppState;

const SERVICE_NAME: &str = "mailbox-api";

/// GET /health
///
/// 数据库不可用时返回 503，供负载均衡摘除实例
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let database = match &state.database {
        Some(db) => {
            if db.health_check().await.is_ok() {
                "ok"
            } else {
                "fail"
            }
        }
        None => "memory",
    };
    let healthy = database != "fail";

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if healthy { "ok" } else { "degraded" },
            "service": SERVICE_NAME,
            "checks": {
                "database": database
            }
        })),
    )
}
