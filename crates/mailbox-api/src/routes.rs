//! 路由配置模块
//!
//! 路由分三组：
//!
//! - 公开：`/health`、`/claim`
//! - 玩家：`/inbox`、`/inbox/claim`，需要有效 Token
//! - 管理：`/admin/*`、`/campaigns`、`/promoPairings`、`/inboxAge`，需要 admin 角色

use axum::{
    Router, middleware,
    routing::{get, patch, post},
};
use mailbox_shared::observability::middleware as obs_middleware;

use crate::middleware::{auth_middleware, require_admin};
use crate::{handlers, state::AppState};

/// 公开路由
fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/claim", get(handlers::campaign::claim_reward))
}

/// 玩家收件箱路由
fn inbox_routes() -> Router<AppState> {
    Router::new()
        .route("/inbox", get(handlers::inbox::get_inbox))
        .route("/inbox/claim", patch(handlers::inbox::claim))
}

/// 管理路由
fn admin_routes() -> Router<AppState> {
    Router::new()
        // 全局消息
        .route(
            "/admin/global/messages",
            get(handlers::global_message::list_global_messages),
        )
        .route(
            "/admin/global/messages/send",
            post(handlers::global_message::send_global_message),
        )
        .route(
            "/admin/global/messages/edit",
            patch(handlers::global_message::edit_global_message),
        )
        .route(
            "/admin/global/messages/expire",
            patch(handlers::global_message::expire_global_message),
        )
        // 直发消息
        .route("/admin/messages/send", post(handlers::message::send_message))
        .route("/admin/messages/send/bulk", post(handlers::message::bulk_send))
        .route("/admin/messages/edit", patch(handlers::message::edit_message))
        .route("/admin/messages/expire", patch(handlers::message::expire_message))
        .route("/admin/inbox", get(handlers::inbox::get_inbox_admin))
        // 活动奖励
        .route("/campaigns", post(handlers::campaign::define_campaigns))
        .route("/promoPairings", post(handlers::campaign::generate_pairings))
        .route("/inboxAge", patch(handlers::inbox::set_inbox_age))
        .route_layer(middleware::from_fn(require_admin))
}

/// 构建完整应用
pub fn app(state: AppState) -> Router {
    let authenticated = inbox_routes()
        .merge(admin_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes())
        .merge(authenticated)
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}
