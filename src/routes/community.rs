use crate::error::{Error, Result};
use crate::middleware::auth::AuthUser;
use crate::models::community_message::CommunityMessage;
use crate::routes::form::read_form;
use crate::AppState;
use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

pub async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<CommunityMessage>>> {
    Ok(Json(state.community.list_recent(query.limit).await?))
}

pub async fn post_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CommunityMessage>)> {
    let draft = read_form(multipart).await?.into_draft()?;
    let author = match state.users.get(&auth.uid).await {
        Ok(user) => user,
        Err(Error::NotFound(_)) => {
            return Err(Error::Forbidden("Please complete sign-up before posting".to_string()))
        }
        Err(e) => return Err(e),
    };
    let message = state.community.post(&author, draft).await?;
    Ok((StatusCode::CREATED, Json(message)))
}
