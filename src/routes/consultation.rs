use crate::dto::consultation_dto::{
    ListConsultationsQuery, ScheduleConsultationPayload, ScheduleConsultationResponse, SendMeetingLinkPayload,
};
use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::consultation::ConsultationRequest;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

pub async fn schedule_consultation(
    State(state): State<AppState>,
    auth: Option<Extension<AuthUser>>,
    Json(payload): Json<ScheduleConsultationPayload>,
) -> Result<(StatusCode, Json<ScheduleConsultationResponse>)> {
    let user_id = auth.map(|Extension(user)| user.uid);
    let response = state
        .consultations
        .schedule(payload, user_id, crate::utils::time::today())
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn list_consultations(
    State(state): State<AppState>,
    Query(query): Query<ListConsultationsQuery>,
) -> Result<Json<Vec<ConsultationRequest>>> {
    Ok(Json(state.consultations.list(query.status).await?))
}

pub async fn send_meeting_link(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SendMeetingLinkPayload>,
) -> Result<Json<ConsultationRequest>> {
    let completed = state
        .consultations
        .send_meeting_link(id, &payload.google_meet_link)
        .await?;
    Ok(Json(completed))
}
