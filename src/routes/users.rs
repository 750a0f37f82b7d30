use crate::dto::user_dto::{SetStatusesPayload, SignUpResponse};
use crate::error::{Error, Result};
use crate::middleware::auth::AuthUser;
use crate::models::user::{UpsertUser, User};
use crate::routes::form::read_form;
use crate::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Extension, Json,
};

pub async fn sign_up(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<(StatusCode, Json<SignUpResponse>)> {
    let email = auth
        .email
        .clone()
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| Error::BadRequest("Your account has no email address".to_string()))?;
    let display_name = auth
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

    let (user, created) = state
        .users
        .sign_up(UpsertUser {
            id: auth.uid,
            display_name,
            email,
            photo_url: auth.picture,
        })
        .await?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(SignUpResponse { user, created })))
}

pub async fn upload_photo(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<Json<User>> {
    let mut form = read_form(multipart).await?;
    let photo = form
        .take_file("photo")
        .ok_or_else(|| Error::BadRequest("Please choose a photo to upload".to_string()))?;
    Ok(Json(state.users.upload_photo(&auth.uid, &photo).await?))
}

pub async fn set_statuses(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<SetStatusesPayload>,
) -> Result<Json<User>> {
    Ok(Json(state.users.set_statuses(&user_id, payload.statuses).await?))
}
