//! HTTP 层错误类型定义
//!
//! 领域错误按类别映射为 HTTP 状态码，响应体沿用统一的 `{success, code, message, data}` 结构。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mailbox::{ErrorKind, MailboxError};
use serde_json::json;

/// HTTP 层错误类型
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // 认证错误
    #[error("未授权: {0}")]
    Unauthorized(String),
    #[error("禁止访问: {0}")]
    Forbidden(String),

    // 请求参数错误
    #[error("参数验证失败: {0}")]
    Validation(String),

    // 领域错误
    #[error(transparent)]
    Mailbox(#[from] MailboxError),

    // 系统错误
    #[error("内部错误: {0}")]
    Internal(String),
}

impl ApiError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Mailbox(e) => match e.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::Ineligible => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::System => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Mailbox(e) => e.error_code(),
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            Self::Mailbox(e) if e.kind() == ErrorKind::System => {
                tracing::error!(error = %e, code = e.error_code(), "邮箱服务操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "内部错误");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_status_mapping() {
        let cases = [
            (
                ApiError::from(MailboxError::RequiredFieldMissing("accountId")),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(MailboxError::PairingNotFound("g".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(MailboxError::AlreadyClaimed("m".into())),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(MailboxError::NotYetVisible("m".into())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::from(MailboxError::Internal("boom".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.status_code(), status, "{}", error);
        }
    }

    #[test]
    fn test_error_code_passthrough() {
        let err = ApiError::from(MailboxError::AccountTooYoung {
            account_id: "a".into(),
            required_seconds: 10,
        });
        assert_eq!(err.error_code(), "ACCOUNT_TOO_YOUNG");
        assert_eq!(ApiError::Forbidden("x".into()).error_code(), "FORBIDDEN");
    }
}
