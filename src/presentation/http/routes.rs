//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::{
    auth_middleware, create_cors_layer, create_trace_layer, track_metrics,
};
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/chat", chat_routes(state.clone()))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .route_layer(middleware::from_fn(track_metrics))
        .layer(create_cors_layer(&state.settings.cors))
        .layer(create_trace_layer())
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// Chat routes (protected)
fn chat_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Presence
        .route("/online", post(handlers::chat::go_online))
        .route("/offline", post(handlers::chat::go_offline))
        .route("/heartbeat", post(handlers::chat::heartbeat))
        .route("/online-users", get(handlers::chat::online_users))
        .route("/admins/online", get(handlers::chat::online_admins))
        .route("/users/{user_id}/status", get(handlers::chat::user_status))
        // Messaging
        .route("/messages", post(handlers::chat::send_message))
        .route("/equipment-requests", post(handlers::chat::send_equipment_request))
        .route("/conversations", get(handlers::chat::list_conversations))
        .route(
            "/conversations/{other_user_id}/messages",
            get(handlers::chat::conversation_messages),
        )
        .route(
            "/conversations/{other_user_id}/read",
            post(handlers::chat::mark_conversation_read),
        )
        .route("/unread-count", get(handlers::chat::unread_count))
        // Live relay
        .route("/ws", get(ws_handler))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
