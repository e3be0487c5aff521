//! HTTP 请求处理器

pub mod campaign;
pub mod global_message;
pub mod health;
pub mod inbox;
pub mod message;
