//! 收件箱流程集成测试
//!
//! 使用内存存储跑通调和、领取、全局消息、活动兑换和过期清理的完整流程（无需外部依赖）

use std::sync::Arc;

use mailbox::repository::MessageRepositoryTrait;
use mailbox::test_utils::{MemoryStore, account_id, sample_message};
use mailbox::worker::RetentionSweeper;
use mailbox::{Message, MessageStatus};
use mailbox_shared::config::AppConfig;
use mailbox_shared::config_watcher::DynamicConfig;
use mailbox_shared::timestamp;

// ==================== 辅助函数 ====================

fn global(subject: &str, now: i64) -> Message {
    sample_message(subject, now + 1_000)
}

fn direct_to(account: &str, subject: &str, expiration: i64) -> Message {
    Message {
        id: Message::new_id(),
        recipient: Some(account.to_string()),
        timestamp: timestamp::now(),
        ..sample_message(subject, expiration)
    }
}

fn ids(messages: &[Message]) -> Vec<String> {
    messages.iter().map(|m| m.id.clone()).collect()
}

// ==================== 调和 ====================

#[tokio::test]
async fn test_new_account_fetch_materializes_active_global() {
    let store = MemoryStore::new();
    let services = store.services();
    let now = timestamp::now();

    let published = services
        .global_messages
        .send(global("Welcome", now))
        .await
        .unwrap();

    let inbox = services.inbox.reconcile("player-1").await.unwrap();

    assert_eq!(inbox.account_id, "player-1");
    assert_eq!(inbox.messages.len(), 1);
    let copy = &inbox.messages[0];
    assert_eq!(copy.global_message_id.as_deref(), Some(published.id.as_str()));
    assert_eq!(copy.recipient.as_deref(), Some("player-1"));
    assert_ne!(copy.id, published.id);
    assert_eq!(copy.status, MessageStatus::Unclaimed);
}

#[tokio::test]
async fn test_reconcile_is_idempotent() {
    let store = MemoryStore::new();
    let services = store.services();
    let now = timestamp::now();

    services.global_messages.send(global("A", now)).await.unwrap();
    services.global_messages.send(global("B", now)).await.unwrap();

    let first = services.inbox.reconcile("player-1").await.unwrap();
    let second = services.inbox.reconcile("player-1").await.unwrap();

    assert_eq!(first.messages.len(), 2);
    assert_eq!(ids(&first.messages), ids(&second.messages));
    assert_eq!(store.stored_messages("player-1").await.len(), 2);
    assert_eq!(store.history_for("player-1").await.len(), 2);
}

#[tokio::test]
async fn test_claimed_global_is_not_materialized_again() {
    let store = MemoryStore::new();
    let services = store.services();
    let now = timestamp::now();

    let published = services.global_messages.send(global("A", now)).await.unwrap();
    services.inbox.reconcile("player-1").await.unwrap();
    services.claim.claim("player-1", None).await.unwrap();

    // 副本被移出有效消息表后，历史仍然阻止再次物化
    store.purge_expired(now + 10_000).await.unwrap();
    assert!(store.stored_messages("player-1").await.is_empty());

    let inbox = services.inbox.reconcile("player-1").await.unwrap();
    assert!(inbox.messages.is_empty());

    let copies = store
        .history_for("player-1")
        .await
        .into_iter()
        .filter(|m| m.global_message_id.as_deref() == Some(published.id.as_str()))
        .count();
    assert_eq!(copies, 1);
}

#[tokio::test]
async fn test_eligibility_cutoff_uses_inbox_creation_time() {
    let store = MemoryStore::new();
    let services = store.services();
    let now = timestamp::now();

    // 老账号：先建箱再把注册时间改到两天前
    services.inbox.reconcile("veteran").await.unwrap();
    services.inbox.set_account_age("veteran", 2).await.unwrap();

    let mut returning_players = global("Welcome back", now);
    returning_players.for_accounts_before = Some(timestamp::in_the_past(1));
    services
        .global_messages
        .send(returning_players)
        .await
        .unwrap();

    let veteran = services.inbox.reconcile("veteran").await.unwrap();
    let newcomer = services.inbox.reconcile("newcomer").await.unwrap();

    assert_eq!(veteran.messages.len(), 1);
    assert!(newcomer.messages.is_empty());
}

#[tokio::test]
async fn test_future_visible_message_is_stored_but_hidden() {
    let store = MemoryStore::new();
    let services = store.services();
    let now = timestamp::now();

    let mut scheduled = sample_message("Scheduled", now + 7_200);
    scheduled.visible_from = now + 3_600;
    services
        .messages
        .send_to(&["player-1".to_string()], scheduled)
        .await
        .unwrap();
    services
        .messages
        .send_to(&["player-1".to_string()], sample_message("Now", now + 7_200))
        .await
        .unwrap();

    let inbox = services.inbox.reconcile("player-1").await.unwrap();

    assert_eq!(inbox.messages.len(), 1);
    assert_eq!(inbox.messages[0].subject, "Now");
    assert_eq!(store.stored_messages("player-1").await.len(), 2);
}

#[tokio::test]
async fn test_expired_messages_never_returned() {
    let store = MemoryStore::new();
    let services = store.services();
    let now = timestamp::now();

    services.inbox.reconcile("player-1").await.unwrap();
    store
        .deliver(&[
            direct_to("player-1", "expired", now - 1),
            direct_to("player-1", "live", now + 600),
        ])
        .await
        .unwrap();

    let inbox = services.inbox.reconcile("player-1").await.unwrap();

    assert_eq!(inbox.messages.len(), 1);
    assert_eq!(inbox.messages[0].subject, "live");
    // 已有收件箱在调和时移除过期消息，历史保留到清理任务执行
    assert_eq!(store.stored_messages("player-1").await.len(), 1);
    assert_eq!(store.history_for("player-1").await.len(), 2);
}

#[tokio::test]
async fn test_visible_messages_sorted_by_expiration() {
    let store = MemoryStore::new();
    let services = store.services();
    let now = timestamp::now();
    let accounts = vec!["player-1".to_string()];

    for (subject, ttl) in [("late", 900), ("early", 100), ("middle", 500)] {
        services
            .messages
            .send_to(&accounts, sample_message(subject, now + ttl))
            .await
            .unwrap();
    }

    let inbox = services.inbox.reconcile("player-1").await.unwrap();
    let subjects: Vec<&str> = inbox.messages.iter().map(|m| m.subject.as_str()).collect();
    assert_eq!(subjects, vec!["early", "middle", "late"]);
}

// ==================== 领取 ====================

#[tokio::test]
async fn test_claim_transitions_exactly_once() {
    let store = MemoryStore::new();
    let services = store.services();
    let now = timestamp::now();

    let sent = services
        .messages
        .send_to(&["player-1".to_string()], sample_message("Gift", now + 600))
        .await
        .unwrap();
    let message_id = sent[0].id.clone();

    let claimed = services
        .claim
        .claim("player-1", Some(message_id.as_str()))
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].status, MessageStatus::Claimed);
    assert!(claimed[0].claimed_on.is_some());

    let err = services
        .claim
        .claim("player-1", Some(message_id.as_str()))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "ALREADY_CLAIMED");

    let stored = store.stored_messages("player-1").await;
    assert_eq!(stored[0].status, MessageStatus::Claimed);
    assert_eq!(store.history_for("player-1").await[0].status, MessageStatus::Claimed);
}

#[tokio::test]
async fn test_concurrent_claims_succeed_once() {
    let store = MemoryStore::new();
    let services = store.services();
    let now = timestamp::now();

    let sent = services
        .messages
        .send_to(&["player-1".to_string()], sample_message("Gift", now + 600))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let claim = Arc::clone(&services.claim);
        let message_id = sent[0].id.clone();
        handles.push(tokio::spawn(async move {
            claim.claim("player-1", Some(message_id.as_str())).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(e) => assert_eq!(e.error_code(), "ALREADY_CLAIMED"),
        }
    }
    assert_eq!(succeeded, 1);
}

#[tokio::test]
async fn test_claim_all_then_nothing_left() {
    let store = MemoryStore::new();
    let services = store.services();
    let now = timestamp::now();
    let accounts = vec!["player-1".to_string()];

    for subject in ["a", "b", "c"] {
        services
            .messages
            .send_to(&accounts, sample_message(subject, now + 600))
            .await
            .unwrap();
    }

    let claimed = services.claim.claim("player-1", None).await.unwrap();
    assert_eq!(claimed.len(), 3);
    assert!(claimed.iter().all(|m| m.status == MessageStatus::Claimed));

    let again = services.claim.claim("player-1", None).await.unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn test_claim_foreign_message_not_found() {
    let store = MemoryStore::new();
    let services = store.services();
    let now = timestamp::now();

    let sent = services
        .messages
        .send_to(&["owner".to_string()], sample_message("Gift", now + 600))
        .await
        .unwrap();

    let err = services
        .claim
        .claim("intruder", Some(sent[0].id.as_str()))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "MESSAGE_NOT_FOUND");
}

// ==================== 全局消息 ====================

#[tokio::test]
async fn test_global_edit_propagates_to_copies() {
    let store = MemoryStore::new();
    let services = store.services();
    let now = timestamp::now();

    let published = services.global_messages.send(global("Old", now)).await.unwrap();
    services.inbox.reconcile("player-1").await.unwrap();
    services.inbox.reconcile("player-2").await.unwrap();

    let update = services
        .global_messages
        .edit(Message {
            subject: "New".to_string(),
            ..published.clone()
        })
        .await
        .unwrap();

    assert_eq!(update.affected, 2);
    assert_eq!(update.global_message.previous_versions.len(), 1);
    assert_eq!(update.global_message.previous_versions[0].subject, "Old");

    let copy = &store.stored_messages("player-1").await[0];
    assert_eq!(copy.subject, "New");
    assert!(copy.previous_versions.is_empty());
    assert_eq!(store.history_for("player-2").await[0].subject, "New");
}

#[tokio::test]
async fn test_global_expire_hides_copies() {
    let store = MemoryStore::new();
    let services = store.services();
    let now = timestamp::now();

    let published = services.global_messages.send(global("Event", now)).await.unwrap();
    assert_eq!(services.inbox.reconcile("player-1").await.unwrap().messages.len(), 1);

    let update = services.global_messages.expire(&published.id).await.unwrap();
    assert_eq!(update.affected, 1);

    assert!(services.inbox.reconcile("player-1").await.unwrap().messages.is_empty());
    assert!(services.global_messages.list(false).await.unwrap().is_empty());
    assert_eq!(services.global_messages.list(true).await.unwrap().len(), 1);
}

// ==================== 直发消息 ====================

#[tokio::test]
async fn test_edit_direct_message_keeps_previous_version() {
    let store = MemoryStore::new();
    let services = store.services();
    let now = timestamp::now();

    let sent = services
        .messages
        .send_to(&["player-1".to_string()], sample_message("Typo", now + 600))
        .await
        .unwrap();

    let edited = services
        .messages
        .edit(Message {
            subject: "Fixed".to_string(),
            ..sent[0].clone()
        })
        .await
        .unwrap();

    assert_eq!(edited.subject, "Fixed");
    assert_eq!(edited.previous_versions.len(), 1);
    assert_eq!(edited.previous_versions[0].subject, "Typo");
    assert_eq!(store.history_for("player-1").await[0].subject, "Fixed");
}

#[tokio::test]
async fn test_expire_direct_message() {
    let store = MemoryStore::new();
    let services = store.services();
    let now = timestamp::now();

    let sent = services
        .messages
        .send_to(&["player-1".to_string()], sample_message("Gift", now + 600))
        .await
        .unwrap();

    services.messages.expire("player-1", &sent[0].id).await.unwrap();
    assert!(services.inbox.reconcile("player-1").await.unwrap().messages.is_empty());
}

// ==================== 活动兑换 ====================

#[tokio::test]
async fn test_guid_redemption_consumes_pairing() {
    let store = MemoryStore::new();
    let services = store.services();
    let now = timestamp::now();
    let player = account_id(1);

    let mut template = sample_message("Launch reward", 0);
    template.promo_code = Some("X".to_string());
    services.campaigns.define(vec![template], 30).await.unwrap();

    let pairings = services
        .pairings
        .generate(&player, now + 3_600, &["X".to_string()])
        .await
        .unwrap();
    let guid = pairings[0].id.clone();

    let reward = services.campaigns.claim_with_guid(&guid).await.unwrap();
    assert_eq!(reward.recipient.as_deref(), Some(player.as_str()));
    assert_eq!(reward.promo_code.as_deref(), Some("X"));

    let stored = store.stored_messages(&player).await;
    assert_eq!(stored.len(), 1);
    assert_eq!(store.pairing_count().await, 0);

    let err = services.campaigns.claim_with_guid(&guid).await.unwrap_err();
    assert_eq!(err.error_code(), "PAIRING_NOT_FOUND");
    assert_eq!(store.stored_messages(&player).await.len(), 1);
}

#[tokio::test]
async fn test_direct_redemption_once_per_account() {
    let store = MemoryStore::new();
    let services = store.services();
    let player = account_id(2);

    let mut template = sample_message("Promo", 0);
    template.promo_code = Some("SPRING".to_string());
    services.campaigns.define(vec![template], 30).await.unwrap();

    services
        .campaigns
        .claim_with_account_id(&player, "SPRING")
        .await
        .unwrap();
    let err = services
        .campaigns
        .claim_with_account_id(&player, "SPRING")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "PROMO_ALREADY_REDEEMED");

    let unknown = services
        .campaigns
        .claim_with_account_id(&player, "WINTER")
        .await
        .unwrap_err();
    assert_eq!(unknown.error_code(), "CAMPAIGN_NOT_FOUND");
}

#[tokio::test]
async fn test_direct_message_claim_code_does_not_block_campaign() {
    let store = MemoryStore::new();
    let services = store.services();
    let now = timestamp::now();
    let player = account_id(4);

    let mut direct = sample_message("Patch gift", now + 600);
    direct.promo_code = Some("SUMMER".to_string());
    services
        .messages
        .send_to(std::slice::from_ref(&player), direct.clone())
        .await
        .unwrap();
    services
        .messages
        .send_to(std::slice::from_ref(&player), direct)
        .await
        .unwrap();
    assert_eq!(store.history_for(&player).await.len(), 2);

    let mut template = sample_message("Summer reward", 0);
    template.promo_code = Some("SUMMER".to_string());
    services.campaigns.define(vec![template], 30).await.unwrap();

    let reward = services
        .campaigns
        .claim_with_account_id(&player, "SUMMER")
        .await
        .unwrap();
    assert_eq!(reward.promo_code.as_deref(), Some("SUMMER"));
}

#[tokio::test]
async fn test_redemption_requires_account_age() {
    let store = MemoryStore::new();
    let services = store.services();
    let player = account_id(3);

    let mut template = sample_message("Veteran reward", 0);
    template.promo_code = Some("VET".to_string());
    template.minimum_account_age = timestamp::ONE_WEEK;
    services.campaigns.define(vec![template], 30).await.unwrap();

    let err = services
        .campaigns
        .claim_with_account_id(&player, "VET")
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "ACCOUNT_TOO_YOUNG");

    services.inbox.set_account_age(&player, 8).await.unwrap();
    services
        .campaigns
        .claim_with_account_id(&player, "VET")
        .await
        .unwrap();
}

// ==================== 过期清理 ====================

#[tokio::test]
async fn test_retention_sweep_boundary() {
    let store = MemoryStore::new();
    let config = DynamicConfig::new(AppConfig::default());
    let buffer = config.mailbox().retention_buffer_seconds;
    let now = timestamp::now();

    store
        .deliver(&[
            direct_to("player-1", "past buffer", now - buffer - 1),
            direct_to("player-1", "inside buffer", now - buffer + 1),
        ])
        .await
        .unwrap();

    let sweeper = RetentionSweeper::new(Arc::new(store.clone()), Arc::new(store.clone()), config);
    let report = sweeper.tick(now).await;

    assert_eq!(report.messages, 1);
    assert_eq!(report.history, 1);
    let remaining = store.stored_messages("player-1").await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].subject, "inside buffer");
}

#[tokio::test]
async fn test_expired_global_copy_stays_gone_after_sweep() {
    let store = MemoryStore::new();
    let services = store.services();
    let config = DynamicConfig::new(AppConfig::default());
    let now = timestamp::now();

    let published = services
        .global_messages
        .send(sample_message("Monthly event", now + 30 * timestamp::ONE_DAY))
        .await
        .unwrap();

    let inbox = services.inbox.reconcile("player-1").await.unwrap();
    let copy_id = inbox.messages[0].id.clone();
    services.messages.expire("player-1", &copy_id).await.unwrap();
    assert!(services.inbox.reconcile("player-1").await.unwrap().messages.is_empty());

    let sweeper = RetentionSweeper::new(Arc::new(store.clone()), Arc::new(store.clone()), config);
    let report = sweeper.tick(now + 8 * timestamp::ONE_DAY).await;
    assert_eq!(report.history, 0);
    assert_eq!(report.failed, 0);

    let after = services.inbox.reconcile("player-1").await.unwrap();
    assert!(after.messages.is_empty());
    assert!(store.stored_messages("player-1").await.is_empty());

    // 目录本身被清理后，历史随之删除
    let report = sweeper.tick(now + 38 * timestamp::ONE_DAY).await;
    assert_eq!(report.global_messages, 1);
    assert_eq!(report.history, 1);
    assert!(
        store
            .history_for("player-1")
            .await
            .iter()
            .all(|m| m.global_message_id.as_deref() != Some(published.id.as_str()))
    );
}
