//! 业务服务层
//!
//! - `InboxService`：收件箱调和（全局消息扇出）与账号年龄规则
//! - `ClaimService`：单条与批量领取
//! - `GlobalMessageService`：全局消息目录的发布、编辑、过期及副本同步
//! - `MessageService`：管理员直发、批量发送、编辑、过期
//! - `CampaignService`：活动奖励模板与兑换
//! - `PairingService`：领取链接发放

pub mod dto;

mod campaign_service;
mod claim_service;
mod global_message_service;
mod inbox_service;
mod message_service;
mod pairing_service;

pub use campaign_service::CampaignService;
pub use claim_service::ClaimService;
pub use global_message_service::GlobalMessageService;
pub use inbox_service::InboxService;
pub use message_service::MessageService;
pub use pairing_service::PairingService;

use std::sync::Arc;

use sqlx::PgPool;

use crate::repository::{
    CampaignRepository, CampaignRepositoryTrait, GlobalMessageRepository,
    GlobalMessageRepositoryTrait, InboxRepository, InboxRepositoryTrait, MessageRepository,
    MessageRepositoryTrait, PairingRepository, PairingRepositoryTrait,
};

/// 按仓储组装好的全部服务，供 HTTP 层与后台任务共享
#[derive(Clone)]
pub struct MailboxServices {
    pub inbox: Arc<InboxService>,
    pub claim: Arc<ClaimService>,
    pub global_messages: Arc<GlobalMessageService>,
    pub messages: Arc<MessageService>,
    pub campaigns: Arc<CampaignService>,
    pub pairings: Arc<PairingService>,
}

impl MailboxServices {
    pub fn new(
        inboxes: Arc<dyn InboxRepositoryTrait>,
        messages: Arc<dyn MessageRepositoryTrait>,
        globals: Arc<dyn GlobalMessageRepositoryTrait>,
        campaigns: Arc<dyn CampaignRepositoryTrait>,
        pairings: Arc<dyn PairingRepositoryTrait>,
    ) -> Self {
        let inbox = Arc::new(InboxService::new(
            inboxes,
            messages.clone(),
            globals.clone(),
        ));

        Self {
            claim: Arc::new(ClaimService::new(messages.clone())),
            global_messages: Arc::new(GlobalMessageService::new(globals, messages.clone())),
            messages: Arc::new(MessageService::new(messages.clone())),
            campaigns: Arc::new(CampaignService::new(
                campaigns,
                pairings.clone(),
                messages,
                inbox.clone(),
            )),
            pairings: Arc::new(PairingService::new(pairings)),
            inbox,
        }
    }

    /// 使用 PostgreSQL 仓储组装
    pub fn postgres(pool: PgPool) -> Self {
        Self::new(
            Arc::new(InboxRepository::new(pool.clone())),
            Arc::new(MessageRepository::new(pool.clone())),
            Arc::new(GlobalMessageRepository::new(pool.clone())),
            Arc::new(CampaignRepository::new(pool.clone())),
            Arc::new(PairingRepository::new(pool)),
        )
    }
}
