//! 活动奖励接口
//!
//! 管理员定义活动模板、发放领取链接；玩家通过 `/claim` 兑换。
//! 兑换模式由 `mailbox.guid_campaign_format` 决定，每次请求读取当前配置。

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use tracing::info;
use validator::Validate;

use crate::auth::Claims;
use crate::dto::{
    ApiResponse, CampaignsResponse, ClaimRewardQuery, DefineCampaignsRequest,
    GeneratePairingsRequest, PairingsResponse, RewardResponse,
};
use crate::error::ApiError;
use crate::state::AppState;

/// 定义或替换活动模板
///
/// POST /campaigns
pub async fn define_campaigns(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<DefineCampaignsRequest>,
) -> Result<Json<ApiResponse<CampaignsResponse>>, ApiError> {
    req.validate()?;

    let lifetime_years = state.config.mailbox().campaign_default_lifetime_years;
    let campaigns = state
        .services
        .campaigns
        .define(req.campaigns, lifetime_years)
        .await?;

    info!(operator = %claims.sub, count = campaigns.len(), "管理员定义活动模板");
    Ok(Json(ApiResponse::success(CampaignsResponse { campaigns })))
}

/// 生成领取链接
///
/// POST /promoPairings
pub async fn generate_pairings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<GeneratePairingsRequest>,
) -> Result<Json<ApiResponse<PairingsResponse>>, ApiError> {
    req.validate()?;

    let pairings = state
        .services
        .pairings
        .generate(&req.account_id, req.expiration, &req.promo_codes)
        .await?;

    info!(
        operator = %claims.sub,
        account_id = %req.account_id,
        count = pairings.len(),
        "管理员生成领取链接"
    );
    Ok(Json(ApiResponse::success(PairingsResponse { pairings })))
}

/// 兑换活动奖励（无需登录）
///
/// GET /claim?promoCode=&accountId= 或 GET /claim?guid=
pub async fn claim_reward(
    State(state): State<AppState>,
    Query(query): Query<ClaimRewardQuery>,
) -> Result<Json<ApiResponse<RewardResponse>>, ApiError> {
    let campaigns = &state.services.campaigns;

    let message = if state.config.mailbox().guid_campaign_format {
        let guid = required(query.guid.as_deref(), "guid")?;
        campaigns.claim_with_guid(guid).await?
    } else {
        let promo_code = required(query.promo_code.as_deref(), "promoCode")?;
        let account_id = required(query.account_id.as_deref(), "accountId")?;
        campaigns.claim_with_account_id(account_id, promo_code).await?
    };

    Ok(Json(ApiResponse::success(RewardResponse::from(message))))
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, ApiError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Validation(format!("缺少参数: {}", field)))
}
