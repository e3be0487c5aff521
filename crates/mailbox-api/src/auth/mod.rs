//! 认证模块
//!
//! Token 由外部身份服务签发，这里只负责校验和解析。

mod jwt;

pub use jwt::{ADMIN_ROLE, Claims, JwtVerifier};
