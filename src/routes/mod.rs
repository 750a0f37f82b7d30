pub mod admin_support;
pub mod community;
pub mod consultation;
pub mod form;
pub mod health;
pub mod publishing;
pub mod support;
pub mod users;

use crate::middleware::{auth, rate_limit};
use crate::AppState;
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};

/// Largest accepted request body; attachments travel inline as multipart.
pub const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Every API route with its auth and rate-limit layers. Static file serving,
/// CORS and tracing are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_api = Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/consultations",
            post(consultation::schedule_consultation)
                .route_layer(from_fn_with_state(state.clone(), auth::optional_auth)),
        )
        .layer(from_fn_with_state(
            rate_limit::RateLimiter::new(state.config.public_rps),
            rate_limit::rps_middleware,
        ));

    let member_api = Router::new()
        .route("/api/users/me", post(users::sign_up))
        .route("/api/users/me/photo", post(users::upload_photo))
        .route(
            "/api/support/messages",
            get(support::list_my_messages).post(support::send_message),
        )
        .route(
            "/api/community/messages",
            get(community::list_messages).post(community::post_message),
        )
        .route_layer(from_fn_with_state(state.clone(), auth::require_auth));

    let investor_api = Router::new()
        .route("/api/trade-alerts", get(publishing::list_trade_alerts))
        .route("/api/weekly-reports", get(publishing::list_weekly_reports))
        .route_layer(from_fn_with_state(state.clone(), auth::require_investor_or_admin));

    let admin_api = Router::new()
        .route("/api/admin/support/users", get(admin_support::list_users))
        .route("/api/admin/support/inbox/refresh", post(admin_support::refresh_inbox))
        .route("/api/admin/support/unread/stream", get(admin_support::unread_stream))
        .route(
            "/api/admin/support/users/:user_id/select",
            post(admin_support::select_user),
        )
        .route(
            "/api/admin/support/users/:user_id/stream",
            get(admin_support::conversation_stream),
        )
        .route(
            "/api/admin/support/users/:user_id/replies",
            post(admin_support::send_reply),
        )
        .route("/api/admin/consultations", get(consultation::list_consultations))
        .route(
            "/api/admin/consultations/:id/link",
            post(consultation::send_meeting_link),
        )
        .route("/api/admin/users/:user_id/statuses", put(users::set_statuses))
        .route("/api/admin/trade-alerts", post(publishing::create_trade_alert))
        .route("/api/admin/weekly-reports", post(publishing::create_weekly_report))
        .route_layer(from_fn_with_state(state.clone(), auth::require_admin));

    let authenticated_api = member_api
        .merge(investor_api)
        .merge(admin_api)
        .layer(from_fn_with_state(
            rate_limit::RateLimiter::new(state.config.api_rps),
            rate_limit::rps_middleware,
        ));

    public_api
        .merge(authenticated_api)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
