//! JWT 认证中间件
//!
//! 验证请求中的 Bearer Token 并将 Claims 注入请求扩展；
//! 管理接口在此基础上要求 admin 角色。

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::auth::Claims;
use crate::error::ApiError;
use crate::state::AppState;

/// 认证中间件
///
/// 只挂在需要认证的路由上（route_layer），公开路由不经过这里。
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let Some(token) = token else {
        return ApiError::Unauthorized("缺少认证 Token".to_string()).into_response();
    };

    match state.jwt.verify_token(token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// 要求 admin 角色
pub async fn require_admin(request: Request<Body>, next: Next) -> Response {
    let Some(claims) = request.extensions().get::<Claims>() else {
        return ApiError::Unauthorized("未认证".to_string()).into_response();
    };

    if !claims.is_admin() {
        warn!(
            account_id = %claims.sub,
            path = %request.uri().path(),
            "非管理员访问管理接口"
        );
        return ApiError::Forbidden("需要管理员权限".to_string()).into_response();
    }

    next.run(request).await
}
