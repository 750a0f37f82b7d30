use crate::models::support_message::{SupportMessage, TimelineEntry};
use crate::services::support_service::MarkReadReport;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ConversationResponse {
    pub user_id: String,
    pub messages: Vec<SupportMessage>,
    pub timeline: Vec<TimelineEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectConversationResponse {
    pub user_id: String,
    pub has_unread_messages: bool,
    pub read: MarkReadReport,
    pub messages: Vec<SupportMessage>,
    pub timeline: Vec<TimelineEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnreadSnapshot {
    pub user_ids: Vec<String>,
}
