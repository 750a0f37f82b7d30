use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

pub const CONSULTATION_TYPE: &str = "consultation";

/// Bookable slots offered by the scheduling form.
pub const TIME_SLOTS: &[&str] = &[
    "9:00 AM", "10:00 AM", "11:00 AM", "12:00 PM", "1:00 PM", "2:00 PM", "3:00 PM", "4:00 PM",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsultationStatus {
    Pending,
    Completed,
}

impl ConsultationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Pending => "pending",
            ConsultationStatus::Completed => "completed",
        }
    }
}

impl FromStr for ConsultationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ConsultationStatus::Pending),
            "completed" => Ok(ConsultationStatus::Completed),
            other => Err(format!("unknown consultation status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationRequest {
    pub id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub company: Option<String>,
    pub date: NaiveDate,
    pub time: String,
    pub message: Option<String>,
    pub status: ConsultationStatus,
    #[serde(rename = "type")]
    pub request_type: String,
    pub created_at: DateTime<Utc>,
    pub user_id: Option<String>,
    pub google_meet_link: Option<String>,
    pub link_sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewConsultationRequest {
    pub user_name: String,
    pub user_email: String,
    pub company: Option<String>,
    pub date: NaiveDate,
    pub time: String,
    pub message: Option<String>,
    pub user_id: Option<String>,
}
