//! 后台清理任务
//!
//! 每个任务独立运行在自己的定时循环中，与请求处理只共享数据库。
//! 单次执行失败只记录日志，下一轮照常执行。

mod pairing_sweeper;
mod retention_sweeper;

pub use pairing_sweeper::PairingSweeper;
pub use retention_sweeper::{RetentionSweeper, SweepReport};
