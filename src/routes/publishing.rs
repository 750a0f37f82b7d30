use crate::dto::publishing_dto::{CreateTradeAlertPayload, PublishResponse};
use crate::error::{Error, Result};
use crate::middleware::auth::CurrentUser;
use crate::models::{trade_alert::TradeAlert, weekly_report::WeeklyReport};
use crate::routes::form::read_form;
use crate::services::publishing_service::WeeklyReportDraft;
use crate::AppState;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;

pub async fn list_trade_alerts(State(state): State<AppState>) -> Result<Json<Vec<TradeAlert>>> {
    Ok(Json(state.publishing.list_trade_alerts().await?))
}

pub async fn create_trade_alert(
    State(state): State<AppState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Json(payload): Json<CreateTradeAlertPayload>,
) -> Result<(StatusCode, Json<PublishResponse<TradeAlert>>)> {
    let published = state.publishing.create_trade_alert(&admin, payload).await?;
    Ok((StatusCode::CREATED, Json(published)))
}

pub async fn list_weekly_reports(State(state): State<AppState>) -> Result<Json<Vec<WeeklyReport>>> {
    Ok(Json(state.publishing.list_weekly_reports().await?))
}

pub async fn create_weekly_report(
    State(state): State<AppState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<PublishResponse<WeeklyReport>>)> {
    let mut form = read_form(multipart).await?;

    let week_of = form
        .text("week_of")
        .ok_or_else(|| Error::BadRequest("week_of is required".to_string()))?;
    let week_of = NaiveDate::parse_from_str(week_of.trim(), "%Y-%m-%d")
        .map_err(|_| Error::BadRequest("week_of must be a YYYY-MM-DD date".to_string()))?;
    let file = form
        .take_file("file")
        .ok_or_else(|| Error::BadRequest("Please attach the report file".to_string()))?;

    let draft = WeeklyReportDraft {
        title: form.text("title").unwrap_or_default(),
        summary: form.text("summary"),
        week_of,
        file,
    };
    let published = state.publishing.create_weekly_report(&admin, draft).await?;
    Ok((StatusCode::CREATED, Json(published)))
}
