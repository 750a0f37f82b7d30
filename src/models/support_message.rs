use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Read,
    Responded,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Read => "read",
            MessageStatus::Responded => "responded",
        }
    }
}

impl FromStr for MessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MessageStatus::Pending),
            "read" => Ok(MessageStatus::Read),
            "responded" => Ok(MessageStatus::Responded),
            other => Err(format!("unknown message status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminResponse {
    pub message: Option<String>,
    pub image_url: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportMessage {
    pub id: Uuid,
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub message: Option<String>,
    pub image_url: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub status: MessageStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub admin_response: Option<AdminResponse>,
}

#[derive(Debug, Clone)]
pub struct NewSupportMessage {
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub message: Option<String>,
    pub image_url: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub status: MessageStatus,
    pub admin_response: Option<AdminResponse>,
}

/// Client-authored part of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientContent {
    pub message: Option<String>,
    pub image_url: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
}

/// One renderable entry of a conversation. Each record maps to at most one
/// entry; client and staff content are only paired within the same record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimelineEntry {
    ClientMessage {
        id: Uuid,
        status: MessageStatus,
        created_at: Option<DateTime<Utc>>,
        content: ClientContent,
    },
    AdminReply {
        id: Uuid,
        created_at: Option<DateTime<Utc>>,
        reply: AdminResponse,
    },
    ClientMessageWithReply {
        id: Uuid,
        status: MessageStatus,
        created_at: Option<DateTime<Utc>>,
        content: ClientContent,
        reply: AdminResponse,
    },
}

impl SupportMessage {
    pub fn has_client_content(&self) -> bool {
        self.message.is_some() || self.image_url.is_some() || self.file_url.is_some()
    }

    pub fn is_renderable(&self) -> bool {
        self.has_client_content() || self.admin_response.is_some()
    }

    pub fn timeline_entry(&self) -> Option<TimelineEntry> {
        let content = ClientContent {
            message: self.message.clone(),
            image_url: self.image_url.clone(),
            file_url: self.file_url.clone(),
            file_name: self.file_name.clone(),
        };
        match (self.has_client_content(), self.admin_response.clone()) {
            (true, None) => Some(TimelineEntry::ClientMessage {
                id: self.id,
                status: self.status,
                created_at: self.created_at,
                content,
            }),
            (false, Some(reply)) => Some(TimelineEntry::AdminReply {
                id: self.id,
                created_at: self.created_at,
                reply,
            }),
            (true, Some(reply)) => Some(TimelineEntry::ClientMessageWithReply {
                id: self.id,
                status: self.status,
                created_at: self.created_at,
                content,
                reply,
            }),
            (false, None) => None,
        }
    }
}

pub fn timeline(messages: &[SupportMessage]) -> Vec<TimelineEntry> {
    messages.iter().filter_map(SupportMessage::timeline_entry).collect()
}
