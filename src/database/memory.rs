use super::{
    CommunityStore, ConsultationStore, PublishingStore, SupportMessageChanged, SupportStore, UserStore,
    CHANGE_CHANNEL_CAPACITY,
};
use crate::error::{Error, Result};
use crate::models::{
    community_message::{CommunityMessage, NewCommunityMessage},
    consultation::{ConsultationRequest, ConsultationStatus, NewConsultationRequest, CONSULTATION_TYPE},
    support_message::{MessageStatus, NewSupportMessage, SupportMessage},
    trade_alert::{NewTradeAlert, TradeAlert},
    user::{UpsertUser, User, UserStatus},
    weekly_report::{NewWeeklyReport, WeeklyReport},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// Process-local store used when no database is configured and in tests.
/// Collections keep insertion order.
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    support_tx: broadcast::Sender<SupportMessageChanged>,
}

#[derive(Default)]
struct MemoryState {
    users: Vec<User>,
    support_messages: Vec<SupportMessage>,
    consultations: Vec<ConsultationRequest>,
    trade_alerts: Vec<TradeAlert>,
    weekly_reports: Vec<WeeklyReport>,
    community_messages: Vec<CommunityMessage>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (support_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(MemoryState::default()),
            support_tx,
        }
    }

    fn notify_support(&self, message: &SupportMessage) {
        let _ = self.support_tx.send(SupportMessageChanged {
            user_id: message.user_id.clone(),
            message_id: message.id,
        });
    }
}

#[async_trait]
impl SupportStore for MemoryStore {
    async fn insert_support_message(&self, new: NewSupportMessage) -> Result<SupportMessage> {
        let message = SupportMessage {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            user_name: new.user_name,
            user_email: new.user_email,
            message: new.message,
            image_url: new.image_url,
            file_url: new.file_url,
            file_name: new.file_name,
            status: new.status,
            created_at: Some(Utc::now()),
            admin_response: new.admin_response,
        };
        self.state.write().await.support_messages.push(message.clone());
        self.notify_support(&message);
        Ok(message)
    }

    async fn get_support_message(&self, id: Uuid) -> Result<Option<SupportMessage>> {
        let state = self.state.read().await;
        Ok(state.support_messages.iter().find(|m| m.id == id).cloned())
    }

    async fn list_support_messages_for_user(&self, user_id: &str) -> Result<Vec<SupportMessage>> {
        let state = self.state.read().await;
        Ok(state
            .support_messages
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn has_pending_support_messages(&self, user_id: &str) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state
            .support_messages
            .iter()
            .any(|m| m.user_id == user_id && m.status == MessageStatus::Pending))
    }

    async fn list_pending_support_messages(&self, user_id: Option<&str>) -> Result<Vec<SupportMessage>> {
        let state = self.state.read().await;
        Ok(state
            .support_messages
            .iter()
            .filter(|m| m.status == MessageStatus::Pending)
            .filter(|m| user_id.map_or(true, |uid| m.user_id == uid))
            .cloned()
            .collect())
    }

    async fn update_support_message_status(&self, id: Uuid, status: MessageStatus) -> Result<()> {
        let updated = {
            let mut state = self.state.write().await;
            let message = state
                .support_messages
                .iter_mut()
                .find(|m| m.id == id)
                .ok_or_else(|| Error::NotFound(format!("Support message {} not found", id)))?;
            message.status = status;
            message.clone()
        };
        self.notify_support(&updated);
        Ok(())
    }

    fn subscribe_support_changes(&self) -> broadcast::Receiver<SupportMessageChanged> {
        self.support_tx.subscribe()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn upsert_user(&self, user: UpsertUser) -> Result<(User, bool)> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.users.iter_mut().find(|u| u.id == user.id) {
            existing.display_name = user.display_name;
            existing.email = user.email;
            if user.photo_url.is_some() {
                existing.photo_url = user.photo_url;
            }
            return Ok((existing.clone(), false));
        }

        let created = User {
            id: user.id,
            display_name: user.display_name,
            email: user.email,
            photo_url: user.photo_url,
            statuses: Vec::new(),
            created_at: Utc::now(),
        };
        state.users.push(created.clone());
        Ok((created, true))
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let mut users = self.state.read().await.users.clone();
        users.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(users)
    }

    async fn list_users_with_status(&self, status: UserStatus) -> Result<Vec<User>> {
        let mut users: Vec<User> = self
            .state
            .read()
            .await
            .users
            .iter()
            .filter(|u| u.has_status(status))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(users)
    }

    async fn set_user_statuses(&self, id: &str, statuses: &[UserStatus]) -> Result<User> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| Error::NotFound(format!("User {} not found", id)))?;
        user.statuses = statuses.to_vec();
        Ok(user.clone())
    }

    async fn set_user_photo(&self, id: &str, photo_url: &str) -> Result<User> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| Error::NotFound(format!("User {} not found", id)))?;
        user.photo_url = Some(photo_url.to_string());
        Ok(user.clone())
    }
}

#[async_trait]
impl ConsultationStore for MemoryStore {
    async fn insert_consultation(&self, new: NewConsultationRequest) -> Result<ConsultationRequest> {
        let request = ConsultationRequest {
            id: Uuid::new_v4(),
            user_name: new.user_name,
            user_email: new.user_email,
            company: new.company,
            date: new.date,
            time: new.time,
            message: new.message,
            status: ConsultationStatus::Pending,
            request_type: CONSULTATION_TYPE.to_string(),
            created_at: Utc::now(),
            user_id: new.user_id,
            google_meet_link: None,
            link_sent_at: None,
        };
        self.state.write().await.consultations.push(request.clone());
        Ok(request)
    }

    async fn get_consultation(&self, id: Uuid) -> Result<Option<ConsultationRequest>> {
        let state = self.state.read().await;
        Ok(state.consultations.iter().find(|c| c.id == id).cloned())
    }

    async fn list_consultations(&self, status: Option<ConsultationStatus>) -> Result<Vec<ConsultationRequest>> {
        let state = self.state.read().await;
        Ok(state
            .consultations
            .iter()
            .rev()
            .filter(|c| status.map_or(true, |s| c.status == s))
            .cloned()
            .collect())
    }

    async fn complete_consultation(
        &self,
        id: Uuid,
        meet_link: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<Option<ConsultationRequest>> {
        let mut state = self.state.write().await;
        let Some(request) = state
            .consultations
            .iter_mut()
            .find(|c| c.id == id && c.status == ConsultationStatus::Pending)
        else {
            return Ok(None);
        };
        request.status = ConsultationStatus::Completed;
        request.google_meet_link = Some(meet_link.to_string());
        request.link_sent_at = Some(sent_at);
        Ok(Some(request.clone()))
    }
}

#[async_trait]
impl PublishingStore for MemoryStore {
    async fn insert_trade_alert(&self, new: NewTradeAlert) -> Result<TradeAlert> {
        let alert = TradeAlert {
            id: Uuid::new_v4(),
            title: new.title,
            symbol: new.symbol,
            action: new.action,
            entry_price: new.entry_price,
            target_price: new.target_price,
            stop_loss: new.stop_loss,
            notes: new.notes,
            created_by: new.created_by,
            created_at: Utc::now(),
        };
        self.state.write().await.trade_alerts.push(alert.clone());
        Ok(alert)
    }

    async fn list_trade_alerts(&self) -> Result<Vec<TradeAlert>> {
        let state = self.state.read().await;
        Ok(state.trade_alerts.iter().rev().cloned().collect())
    }

    async fn insert_weekly_report(&self, new: NewWeeklyReport) -> Result<WeeklyReport> {
        let report = WeeklyReport {
            id: new.id,
            title: new.title,
            summary: new.summary,
            week_of: new.week_of,
            file_url: new.file_url,
            file_name: new.file_name,
            created_by: new.created_by,
            created_at: Utc::now(),
        };
        let mut state = self.state.write().await;
        if state.weekly_reports.iter().any(|r| r.id == report.id) {
            return Err(Error::Conflict(format!("Weekly report {} already exists", report.id)));
        }
        state.weekly_reports.push(report.clone());
        Ok(report)
    }

    async fn list_weekly_reports(&self) -> Result<Vec<WeeklyReport>> {
        let mut reports = self.state.read().await.weekly_reports.clone();
        reports.reverse();
        reports.sort_by(|a, b| b.week_of.cmp(&a.week_of));
        Ok(reports)
    }
}

#[async_trait]
impl CommunityStore for MemoryStore {
    async fn insert_community_message(&self, new: NewCommunityMessage) -> Result<CommunityMessage> {
        let message = CommunityMessage {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            user_name: new.user_name,
            message: new.message,
            image_url: new.image_url,
            file_url: new.file_url,
            file_name: new.file_name,
            created_at: Utc::now(),
        };
        self.state.write().await.community_messages.push(message.clone());
        Ok(message)
    }

    async fn list_recent_community_messages(&self, limit: i64) -> Result<Vec<CommunityMessage>> {
        let state = self.state.read().await;
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        let skip = state.community_messages.len().saturating_sub(limit);
        Ok(state.community_messages.iter().skip(skip).cloned().collect())
    }
}
