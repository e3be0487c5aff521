//! 全局消息扇出规则
//!
//! 纯函数：给定全局消息目录、账号已知的全局消息 ID 和收件箱创建时间，
//! 计算需要物化的副本，以及返回给调用方的可见消息集合。

use std::collections::HashSet;

use crate::models::{Inbox, Message};

/// 全局消息对该收件箱是否有效且符合受众条件
///
/// - `visible_from < now` 且 `expiration > now`
/// - `for_accounts_before` 未设置，或收件箱创建时间严格早于该值
pub fn is_eligible(global: &Message, inbox_created_on: i64, now: i64) -> bool {
    global.is_visible_at(now)
        && !global.is_expired_at(now)
        && global
            .for_accounts_before
            .filter(|cutoff| *cutoff > 0)
            .is_none_or(|cutoff| inbox_created_on < cutoff)
}

/// 计算需要新物化到收件箱中的副本
///
/// 以 `global_message_id` 去重，已经物化过（包括已领取、已过期后被移出的）的全局消息不会再次插入。
pub fn plan_materialization(
    globals: &[Message],
    known_global_ids: &HashSet<String>,
    inbox: &Inbox,
    now: i64,
) -> Vec<Message> {
    let mut planned: HashSet<&str> = HashSet::new();
    globals
        .iter()
        .filter(|global| is_eligible(global, inbox.created_on, now))
        .filter(|global| !known_global_ids.contains(&global.id))
        .filter(|global| planned.insert(global.id.as_str()))
        .map(|global| global.materialize_for(&inbox.account_id))
        .collect()
}

/// 按过期时间升序排序，过期时间相同时按 ID 保证稳定输出
pub fn sort_by_expiration(messages: &mut [Message]) {
    messages.sort_by(|a, b| a.expiration.cmp(&b.expiration).then_with(|| a.id.cmp(&b.id)));
}

/// 返回给调用方的可见集合：已可见且未过期，按过期时间升序
pub fn visible_messages(messages: Vec<Message>, now: i64) -> Vec<Message> {
    let mut visible: Vec<Message> = messages
        .into_iter()
        .filter(|message| message.is_live_at(now))
        .collect();
    sort_by_expiration(&mut visible);
    visible
}
