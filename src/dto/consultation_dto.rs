use crate::models::consultation::{ConsultationRequest, ConsultationStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ScheduleConsultationPayload {
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    pub company: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleConsultationResponse {
    pub success: bool,
    pub request: ConsultationRequest,
    pub confirmation_sent: bool,
    /// How long the success notice stays visible before it clears.
    pub display_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListConsultationsQuery {
    pub status: Option<ConsultationStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMeetingLinkPayload {
    #[serde(default)]
    pub google_meet_link: String,
}
