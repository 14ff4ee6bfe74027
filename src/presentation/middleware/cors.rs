//! CORS Middleware Configuration
//!
//! The chat API is called from the portal front-end only, so methods and
//! headers are limited to what the chat routes use.

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

use crate::config::CorsSettings;

const CHAT_METHODS: [Method; 3] = [Method::GET, Method::POST, Method::OPTIONS];

/// Create CORS layer from settings
pub fn create_cors_layer(settings: &CorsSettings) -> CorsLayer {
    let origins = parse_origins(&settings.allowed_origins);

    let layer = CorsLayer::new()
        .allow_methods(CHAT_METHODS)
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer
            .allow_origin(origins)
            .max_age(std::time::Duration::from_secs(3600))
    }
}

/// Origins that parse as header values; `*` means any origin.
fn parse_origins(configured: &[String]) -> Vec<HeaderValue> {
    if configured.iter().any(|o| o.trim() == "*") {
        return Vec::new();
    }
    configured
        .iter()
        .filter_map(|o| o.trim().parse().ok())
        .collect()
}
