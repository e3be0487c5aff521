//! 全局消息管理接口

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use mailbox::Message;
use mailbox::service::dto::GlobalUpdate;
use tracing::info;
use validator::Validate;

use crate::auth::Claims;
use crate::dto::{
    ApiResponse, ExpireGlobalMessageRequest, GlobalMessageRequest, GlobalMessagesResponse,
    ListGlobalMessagesQuery,
};
use crate::error::ApiError;
use crate::state::AppState;

/// 全局消息目录
///
/// GET /admin/global/messages?includeInactive=
pub async fn list_global_messages(
    State(state): State<AppState>,
    Query(query): Query<ListGlobalMessagesQuery>,
) -> Result<Json<ApiResponse<GlobalMessagesResponse>>, ApiError> {
    let global_messages = state
        .services
        .global_messages
        .list(query.include_inactive)
        .await?;

    Ok(Json(ApiResponse::success(GlobalMessagesResponse {
        global_messages,
    })))
}

/// 发布全局消息
///
/// POST /admin/global/messages/send
pub async fn send_global_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<GlobalMessageRequest>,
) -> Result<Json<ApiResponse<Message>>, ApiError> {
    let global = state
        .services
        .global_messages
        .send(req.global_message)
        .await?;

    info!(operator = %claims.sub, global_message_id = %global.id, "管理员发布全局消息");
    Ok(Json(ApiResponse::success(global)))
}

/// 编辑全局消息
///
/// PATCH /admin/global/messages/edit
pub async fn edit_global_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<GlobalMessageRequest>,
) -> Result<Json<ApiResponse<GlobalUpdate>>, ApiError> {
    let update = state
        .services
        .global_messages
        .edit(req.global_message)
        .await?;

    info!(
        operator = %claims.sub,
        global_message_id = %update.global_message.id,
        affected = update.affected,
        "管理员编辑全局消息"
    );
    Ok(Json(ApiResponse::success(update)))
}

/// 立即过期全局消息
///
/// PATCH /admin/global/messages/expire
pub async fn expire_global_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ExpireGlobalMessageRequest>,
) -> Result<Json<ApiResponse<GlobalUpdate>>, ApiError> {
    req.validate()?;

    let update = state
        .services
        .global_messages
        .expire(&req.message_id)
        .await?;

    info!(
        operator = %claims.sub,
        global_message_id = %req.message_id,
        affected = update.affected,
        "管理员过期全局消息"
    );
    Ok(Json(ApiResponse::success(update)))
}
