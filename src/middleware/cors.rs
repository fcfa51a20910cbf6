use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};

/// Learner UI and admin console talk to the API from other origins.
pub fn api_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(Any)
}
