//! 收件箱接口
//!
//! 玩家读取和领取自己的收件箱；管理员查看任意账号收件箱、修改账号注册时间。

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Query, State},
};
use mailbox::Inbox;
use tracing::info;
use validator::Validate;

use crate::auth::Claims;
use crate::dto::{AccountQuery, ApiResponse, ClaimRequest, ClaimResponse, InboxAgeRequest};
use crate::error::ApiError;
use crate::state::AppState;

/// 读取收件箱
///
/// GET /inbox
pub async fn get_inbox(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApiResponse<Inbox>>, ApiError> {
    let inbox = state.services.inbox.reconcile(claims.account_id()).await?;
    Ok(Json(ApiResponse::success(inbox)))
}

/// 领取消息
///
/// PATCH /inbox/claim
///
/// 请求体可省略（无 Content-Type 或空 body），等同于领取全部。
pub async fn claim(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: Bytes,
) -> Result<Json<ApiResponse<ClaimResponse>>, ApiError> {
    let req = parse_claim_request(&body)?;
    req.validate()?;

    let claimed = state
        .services
        .claim
        .claim(claims.account_id(), req.message_id.as_deref())
        .await?;

    Ok(Json(ApiResponse::success(ClaimResponse { claimed })))
}

fn parse_claim_request(body: &[u8]) -> Result<ClaimRequest, ApiError> {
    if body.trim_ascii().is_empty() {
        return Ok(ClaimRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::Validation(format!("请求体格式错误: {}", e)))
}

/// 管理员查看账号收件箱（同样会触发调和）
///
/// GET /admin/inbox?accountId=
pub async fn get_inbox_admin(
    State(state): State<AppState>,
    Query(query): Query<AccountQuery>,
) -> Result<Json<ApiResponse<Inbox>>, ApiError> {
    query.validate()?;

    let inbox = state.services.inbox.reconcile(&query.account_id).await?;
    Ok(Json(ApiResponse::success(inbox)))
}

/// 修改账号注册时间为 N 天前
///
/// PATCH /inboxAge
pub async fn set_inbox_age(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<InboxAgeRequest>,
) -> Result<Json<ApiResponse<Inbox>>, ApiError> {
    req.validate()?;

    let inbox = state
        .services
        .inbox
        .set_account_age(&req.account_id, req.days)
        .await?;

    info!(
        operator = %claims.sub,
        account_id = %req.account_id,
        days = req.days,
        "管理员修改账号注册时间"
    );
    Ok(Json(ApiResponse::success(inbox)))
}
