//! Persistence seams. Each collection gets its own trait so services only
//! depend on what they touch; [`postgres::PgStore`] and
//! [`memory::MemoryStore`] implement all of them.

pub mod memory;
pub mod pool;
pub mod postgres;

use crate::error::Result;
use crate::models::{
    community_message::{CommunityMessage, NewCommunityMessage},
    consultation::{ConsultationRequest, ConsultationStatus, NewConsultationRequest},
    support_message::{MessageStatus, NewSupportMessage, SupportMessage},
    trade_alert::{NewTradeAlert, TradeAlert},
    user::{UpsertUser, User, UserStatus},
    weekly_report::{NewWeeklyReport, WeeklyReport},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Capacity of the change fan-out channel. Lagging subscribers reload in full.
pub const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Emitted after a support message is created or updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportMessageChanged {
    pub user_id: String,
    pub message_id: Uuid,
}

#[async_trait]
pub trait SupportStore: Send + Sync {
    async fn insert_support_message(&self, new: NewSupportMessage) -> Result<SupportMessage>;

    async fn get_support_message(&self, id: Uuid) -> Result<Option<SupportMessage>>;

    /// Filtered by user only; the result carries no ordering guarantee.
    async fn list_support_messages_for_user(&self, user_id: &str) -> Result<Vec<SupportMessage>>;

    async fn has_pending_support_messages(&self, user_id: &str) -> Result<bool>;

    /// Every pending message, optionally narrowed to one user.
    async fn list_pending_support_messages(&self, user_id: Option<&str>) -> Result<Vec<SupportMessage>>;

    async fn update_support_message_status(&self, id: Uuid, status: MessageStatus) -> Result<()>;

    fn subscribe_support_changes(&self) -> broadcast::Receiver<SupportMessageChanged>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns the stored user and whether it was newly created.
    async fn upsert_user(&self, user: UpsertUser) -> Result<(User, bool)>;

    async fn get_user(&self, id: &str) -> Result<Option<User>>;

    async fn list_users(&self) -> Result<Vec<User>>;

    async fn list_users_with_status(&self, status: UserStatus) -> Result<Vec<User>>;

    async fn set_user_statuses(&self, id: &str, statuses: &[UserStatus]) -> Result<User>;

    async fn set_user_photo(&self, id: &str, photo_url: &str) -> Result<User>;
}

#[async_trait]
pub trait ConsultationStore: Send + Sync {
    async fn insert_consultation(&self, new: NewConsultationRequest) -> Result<ConsultationRequest>;

    async fn get_consultation(&self, id: Uuid) -> Result<Option<ConsultationRequest>>;

    /// Newest first.
    async fn list_consultations(&self, status: Option<ConsultationStatus>) -> Result<Vec<ConsultationRequest>>;

    /// Moves a pending request to completed. `None` when the request does not
    /// exist or is no longer pending.
    async fn complete_consultation(
        &self,
        id: Uuid,
        meet_link: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<Option<ConsultationRequest>>;
}

#[async_trait]
pub trait PublishingStore: Send + Sync {
    async fn insert_trade_alert(&self, new: NewTradeAlert) -> Result<TradeAlert>;

    /// Newest first.
    async fn list_trade_alerts(&self) -> Result<Vec<TradeAlert>>;

    async fn insert_weekly_report(&self, new: NewWeeklyReport) -> Result<WeeklyReport>;

    /// Newest first.
    async fn list_weekly_reports(&self) -> Result<Vec<WeeklyReport>>;
}

#[async_trait]
pub trait CommunityStore: Send + Sync {
    async fn insert_community_message(&self, new: NewCommunityMessage) -> Result<CommunityMessage>;

    /// The latest `limit` messages, oldest first.
    async fn list_recent_community_messages(&self, limit: i64) -> Result<Vec<CommunityMessage>>;
}
