use axum::http::Method;
use tower_http::cors::{Any, CorsLayer};

/// Webhook callers preflight with OPTIONS before posting signed bodies, so
/// the allow-list must name the secret header explicitly.
pub fn webhook_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any)
}
