use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};

/// Any origin; credentials travel in the `Authorization` header.
pub fn api_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_origin(Any)
}
