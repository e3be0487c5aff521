//! JWT Token 校验

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use mailbox_shared::config::AuthConfig;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// 管理员角色
pub const ADMIN_ROLE: &str = "admin";

/// JWT Claims（Token 载荷）
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// 账号 ID
    pub sub: String,
    /// 角色列表
    #[serde(default)]
    pub roles: Vec<String>,
    /// 签发时间
    pub iat: i64,
    /// 过期时间
    pub exp: i64,
    /// 签发者
    pub iss: String,
}

impl Claims {
    pub fn account_id(&self) -> &str {
        &self.sub
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == ADMIN_ROLE)
    }
}

/// JWT 校验器
#[derive(Clone)]
pub struct JwtVerifier {
    issuer: String,
    decoding_key: DecodingKey,
}

impl JwtVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            issuer: config.issuer.clone(),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        }
    }

    /// 验证并解析 JWT Token
    ///
    /// 签名、过期时间和签发者都必须通过校验
    pub fn verify_token(&self, token: &str) -> Result<Claims, ApiError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    ApiError::Unauthorized("Token 已过期".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => {
                    ApiError::Unauthorized("Token 签发者无效".to_string())
                }
                _ => ApiError::Unauthorized("Token 无效".to_string()),
            },
        )?;

        if token_data.claims.sub.trim().is_empty() {
            return Err(ApiError::Unauthorized("Token 缺少账号信息".to_string()));
        }

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            issuer: "identity-service".to_string(),
        }
    }

    fn sign(secret: &str, issuer: &str, exp_offset: i64) -> String {
        let now = mailbox_shared::timestamp::now();
        let claims = Claims {
            sub: "0123456789abcdef01234567".to_string(),
            roles: vec![ADMIN_ROLE.to_string()],
            iat: now,
            exp: now + exp_offset,
            iss: issuer.to_string(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_verify_valid_token() {
        let verifier = JwtVerifier::new(&config());
        let claims = verifier
            .verify_token(&sign("test-secret", "identity-service", 600))
            .unwrap();
        assert_eq!(claims.account_id(), "0123456789abcdef01234567");
        assert!(claims.is_admin());
    }

    #[test]
    fn test_reject_wrong_secret_issuer_and_expired() {
        let verifier = JwtVerifier::new(&config());
        assert!(verifier
            .verify_token(&sign("other-secret", "identity-service", 600))
            .is_err());
        assert!(verifier
            .verify_token(&sign("test-secret", "someone-else", 600))
            .is_err());
        assert!(verifier
            .verify_token(&sign("test-secret", "identity-service", -600))
            .is_err());
    }
}
