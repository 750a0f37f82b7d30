use crate::config::ConsultationConfig;
use crate::database::ConsultationStore;
use crate::dto::consultation_dto::{ScheduleConsultationPayload, ScheduleConsultationResponse};
use crate::error::{Error, Result};
use crate::models::consultation::{
    ConsultationRequest, ConsultationStatus, NewConsultationRequest, TIME_SLOTS,
};
use crate::services::email_service::{EmailSender, OutboundEmail};
use crate::utils::validation::{is_blank, non_blank};
use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone)]
pub struct ConsultationService {
    store: Arc<dyn ConsultationStore>,
    mailer: Arc<dyn EmailSender>,
    config: ConsultationConfig,
}

impl ConsultationService {
    pub fn new(store: Arc<dyn ConsultationStore>, mailer: Arc<dyn EmailSender>, config: ConsultationConfig) -> Self {
        Self { store, mailer, config }
    }

    /// Bookable when inside the booking window and not a blackout date.
    pub fn is_available(&self, date: NaiveDate, today: NaiveDate) -> bool {
        let last_day = Duration::try_days(self.config.booking_window_days).and_then(|w| today.checked_add_signed(w));
        last_day.map_or(true, |last| date <= last) && !self.config.blackout_dates.contains(&date)
    }

    fn validate_request(&self, payload: &ScheduleConsultationPayload, today: NaiveDate) -> Result<(NaiveDate, String)> {
        let (Some(date), Some(time)) = (payload.date, payload.time.as_deref().filter(|t| !is_blank(t))) else {
            return Err(Error::BadRequest("Please select a date and time".to_string()));
        };
        if is_blank(&payload.name) || is_blank(&payload.email) {
            return Err(Error::BadRequest("Please fill in your name and email".to_string()));
        }
        payload.validate()?;
        if date < today {
            return Err(Error::BadRequest("Please select a date that is not in the past".to_string()));
        }
        if !self.is_available(date, today) {
            return Err(Error::BadRequest("The selected date is not available".to_string()));
        }
        let time = time.trim();
        if !TIME_SLOTS.contains(&time) {
            return Err(Error::BadRequest("Please select one of the available time slots".to_string()));
        }
        Ok((date, time.to_string()))
    }

    /// Persists the request, then tries the confirmation email. The email
    /// outcome never affects the stored request.
    pub async fn schedule(
        &self,
        payload: ScheduleConsultationPayload,
        user_id: Option<String>,
        today: NaiveDate,
    ) -> Result<ScheduleConsultationResponse> {
        let (date, time) = self.validate_request(&payload, today)?;

        let request = self
            .store
            .insert_consultation(NewConsultationRequest {
                user_name: payload.name.trim().to_string(),
                user_email: payload.email.trim().to_string(),
                company: non_blank(payload.company),
                date,
                time,
                message: non_blank(payload.message),
                user_id,
            })
            .await?;
        info!(request_id = %request.id, date = %request.date, time = %request.time, "Consultation requested");

        let outcome = self
            .mailer
            .send(OutboundEmail::consultation_confirmation(&request))
            .await;
        if !outcome.success {
            error!(
                request_id = %request.id,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "Consultation confirmation email failed"
            );
        }

        Ok(ScheduleConsultationResponse {
            success: true,
            request,
            confirmation_sent: outcome.success,
            display_seconds: self.config.success_display_secs,
        })
    }

    pub async fn list(&self, status: Option<ConsultationStatus>) -> Result<Vec<ConsultationRequest>> {
        self.store.list_consultations(status).await
    }

    /// Emails the meeting link and, only if that succeeded, marks the request
    /// completed with the link and send time.
    pub async fn send_meeting_link(&self, id: Uuid, meet_link: &str) -> Result<ConsultationRequest> {
        let meet_link = meet_link.trim();
        if meet_link.is_empty() {
            return Err(Error::BadRequest("Please enter a meeting link".to_string()));
        }
        match url::Url::parse(meet_link) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => return Err(Error::BadRequest("Meeting link must be a valid http(s) URL".to_string())),
        }

        let request = self
            .store
            .get_consultation(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Consultation request {} not found", id)))?;
        if request.status != ConsultationStatus::Pending {
            return Err(Error::Conflict("Consultation request is already completed".to_string()));
        }

        let outcome = self
            .mailer
            .send(OutboundEmail::consultation_link(&request, meet_link))
            .await;
        if !outcome.success {
            let reason = outcome.error.unwrap_or_else(|| "unknown error".to_string());
            error!(request_id = %id, error = %reason, "Meeting link email failed; request left pending");
            return Err(Error::Email(reason));
        }

        match self
            .store
            .complete_consultation(id, meet_link, crate::utils::time::now())
            .await?
        {
            Some(completed) => {
                info!(request_id = %id, "Consultation meeting link sent");
                Ok(completed)
            }
            None => {
                warn!(request_id = %id, "Meeting link emailed but request was completed concurrently");
                Err(Error::Conflict("Consultation request is already completed".to_string()))
            }
        }
    }
}
