use crate::dto::support_dto::ConversationResponse;
use crate::error::{Error, Result};
use crate::middleware::auth::AuthUser;
use crate::models::support_message::timeline;
use crate::models::user::UpsertUser;
use crate::routes::form::read_form;
use crate::services::support_service::Author;
use crate::AppState;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

/// The caller's display identity, preferring the stored profile over claims.
/// A caller without a profile gets one recorded from the claims so the inbox
/// can list them.
async fn author(state: &AppState, auth: &AuthUser) -> Result<Author> {
    let user = match state.users.get(&auth.uid).await {
        Ok(user) => user,
        Err(Error::NotFound(_)) => {
            let email = auth
                .email
                .clone()
                .ok_or_else(|| Error::BadRequest("Your account has no email address".to_string()))?;
            state
                .users
                .record_profile(UpsertUser {
                    id: auth.uid.clone(),
                    display_name: auth.name.clone().unwrap_or_else(|| email.clone()),
                    email,
                    photo_url: auth.picture.clone(),
                })
                .await?
        }
        Err(e) => return Err(e),
    };
    Ok(Author {
        id: user.id,
        name: user.display_name,
        email: user.email,
    })
}

pub async fn list_my_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ConversationResponse>> {
    let messages = state.support.conversation(&auth.uid).await?;
    Ok(Json(ConversationResponse {
        user_id: auth.uid,
        timeline: timeline(&messages),
        messages,
    }))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let draft = read_form(multipart).await?.into_draft()?;
    let author = author(&state, &auth).await?;
    let message = state.support.send_client_message(&author, draft).await?;
    Ok((StatusCode::CREATED, Json(message)))
}
