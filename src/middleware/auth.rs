use crate::error::Error;
use crate::models::user::{User, UserStatus};
use crate::utils::token::{decode_token, Claims};
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Identity of the caller, taken from a verified bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            uid: claims.sub,
            email: claims.email,
            name: claims.name,
            picture: claims.picture,
        }
    }
}

/// The caller's stored profile, inserted by the role-gated middlewares.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, Error> {
    let Some(header) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = header
        .to_str()
        .map_err(|_| Error::Unauthorized("bad_authorization".to_string()))?;
    value
        .strip_prefix("Bearer ")
        .map(Some)
        .ok_or_else(|| Error::Unauthorized("unsupported_scheme".to_string()))
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, Error> {
    let token = bearer_token(headers)?.ok_or_else(|| Error::Unauthorized("missing_authorization".to_string()))?;
    decode_token(token, &state.config.jwt_secret).map(AuthUser::from)
}

pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    match authenticate(&state, req.headers()) {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

/// Attaches the caller when a token is present. A present but invalid token
/// is still rejected.
pub async fn optional_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    match bearer_token(req.headers()) {
        Ok(None) => next.run(req).await,
        Ok(Some(token)) => match decode_token(token, &state.config.jwt_secret) {
            Ok(claims) => {
                req.extensions_mut().insert(AuthUser::from(claims));
                next.run(req).await
            }
            Err(e) => e.into_response(),
        },
        Err(e) => e.into_response(),
    }
}

async fn require_any_status(state: AppState, mut req: Request, next: Next, allowed: &[UserStatus]) -> Response {
    let auth = match authenticate(&state, req.headers()) {
        Ok(auth) => auth,
        Err(e) => return e.into_response(),
    };

    let user = match state.users.get(&auth.uid).await {
        Ok(user) => user,
        Err(Error::NotFound(_)) => return Error::Forbidden("forbidden".to_string()).into_response(),
        Err(e) => return e.into_response(),
    };
    if !allowed.iter().any(|status| user.has_status(*status)) {
        tracing::debug!(user_id = %auth.uid, ?allowed, "Caller lacks required status");
        return Error::Forbidden("forbidden".to_string()).into_response();
    }

    req.extensions_mut().insert(auth);
    req.extensions_mut().insert(CurrentUser(user));
    next.run(req).await
}

pub async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    require_any_status(state, req, next, &[UserStatus::Admin]).await
}

pub async fn require_investor_or_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    require_any_status(state, req, next, &[UserStatus::Investor, UserStatus::Admin]).await
}
