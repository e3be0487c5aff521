//! 直发消息管理接口

use axum::{Extension, Json, extract::State};
use mailbox::Message;
use mailbox::service::dto::BulkSendReport;
use tracing::info;
use validator::Validate;

use crate::auth::Claims;
use crate::dto::{
    ApiResponse, BulkSendRequest, EditMessageRequest, ExpireMessageRequest, SendMessageRequest,
    SentResponse,
};
use crate::error::ApiError;
use crate::state::AppState;

/// 直发给一个或多个账号
///
/// POST /admin/messages/send
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<ApiResponse<SentResponse>>, ApiError> {
    req.validate()?;

    let sent = state
        .services
        .messages
        .send_to(&req.account_ids, req.message)
        .await?;

    info!(operator = %claims.sub, sent = sent.len(), "管理员直发消息");
    Ok(Json(ApiResponse::success(SentResponse { sent })))
}

/// 批量发送
///
/// POST /admin/messages/send/bulk
pub async fn bulk_send(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<BulkSendRequest>,
) -> Result<Json<ApiResponse<BulkSendReport>>, ApiError> {
    req.validate()?;

    let report = state
        .services
        .messages
        .bulk_send(req.messages, req.fail_fast)
        .await?;

    info!(
        operator = %claims.sub,
        sent = report.sent.len(),
        failed = report.failures.len(),
        "管理员批量发送消息"
    );
    Ok(Json(ApiResponse::success(report)))
}

/// 编辑单个账号的消息
///
/// PATCH /admin/messages/edit
pub async fn edit_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<EditMessageRequest>,
) -> Result<Json<ApiResponse<Message>>, ApiError> {
    let message = state.services.messages.edit(req.message).await?;

    info!(operator = %claims.sub, message_id = %message.id, "管理员编辑消息");
    Ok(Json(ApiResponse::success(message)))
}

/// 立即过期单个账号的消息
///
/// PATCH /admin/messages/expire
pub async fn expire_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ExpireMessageRequest>,
) -> Result<Json<ApiResponse<Message>>, ApiError> {
    req.validate()?;

    let message = state
        .services
        .messages
        .expire(&req.account_id, &req.message_id)
        .await?;

    info!(operator = %claims.sub, message_id = %message.id, "管理员过期消息");
    Ok(Json(ApiResponse::success(message)))
}
