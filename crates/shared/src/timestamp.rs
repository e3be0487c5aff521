//! Unix 时间戳（秒）辅助函数
//!
//! 邮箱中的所有时间字段都以秒为单位存储。

use chrono::{Duration, Months, Utc};

pub const ONE_DAY: i64 = 86_400;
pub const ONE_WEEK: i64 = 604_800;

/// 当前时间（秒）
pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// 当前时间之前 N 天
pub fn in_the_past(days: i64) -> i64 {
    (Utc::now() - Duration::days(days)).timestamp()
}

/// 当前时间之后 N 年
pub fn in_the_future_years(years: i64) -> i64 {
    let now = Utc::now();
    u32::try_from(years.max(0))
        .ok()
        .and_then(|y| y.checked_mul(12))
        .and_then(|months| now.checked_add_months(Months::new(months)))
        .unwrap_or(now)
        .timestamp()
}
