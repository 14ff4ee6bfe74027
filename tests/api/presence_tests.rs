//! Presence API Tests

use std::time::Duration;

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

use rental_chat::domain::UserRole;

use crate::common::{body_json, token_for, TestApp, ADMIN_ID, CLIENT_ID};

async fn online_ids(app: &TestApp, token: &str) -> Vec<i64> {
    let json = body_json(app.get_auth("/api/chat/online-users", token).await).await;
    let mut ids: Vec<i64> = serde_json::from_value(json["user_ids"].clone()).unwrap();
    ids.sort_unstable();
    ids
}

#[tokio::test]
async fn test_presence_routes_require_token() {
    let app = TestApp::new().await;

    let response = app.get("/api/chat/online-users").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_accepted_from_query_string() {
    let app = TestApp::new().await;
    let token = token_for(CLIENT_ID, UserRole::Client);

    let response = app
        .get(&format!("/api/chat/online-users?token={}", token))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_online_then_offline() {
    let app = TestApp::new().await;
    let token = token_for(CLIENT_ID, UserRole::Client);

    let response = app.post_auth("/api/chat/online", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"user_id": CLIENT_ID, "online": true, "ttl_secs": 300})
    );
    assert_eq!(online_ids(&app, &token).await, vec![CLIENT_ID]);

    let admin = token_for(ADMIN_ID, UserRole::Admin);
    let status = body_json(
        app.get_auth(&format!("/api/chat/users/{}/status", CLIENT_ID), &admin)
            .await,
    )
    .await;
    assert_eq!(status["online"], true);

    // Offline is immediate, no TTL wait
    app.post_auth("/api/chat/offline", &token).await;
    assert!(online_ids(&app, &token).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_presence_expires_without_heartbeat() {
    let app = TestApp::new().await;
    let token = token_for(CLIENT_ID, UserRole::Client);
    app.post_auth("/api/chat/online", &token).await;

    tokio::time::advance(Duration::from_secs(299)).await;
    assert_eq!(online_ids(&app, &token).await, vec![CLIENT_ID]);

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(online_ids(&app, &token).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_extends_presence() {
    let app = TestApp::new().await;
    let token = token_for(CLIENT_ID, UserRole::Client);
    app.post_auth("/api/chat/online", &token).await;

    tokio::time::advance(Duration::from_secs(200)).await;
    app.post_auth("/api/chat/heartbeat", &token).await;
    tokio::time::advance(Duration::from_secs(200)).await;

    assert_eq!(online_ids(&app, &token).await, vec![CLIENT_ID]);
}

#[tokio::test]
async fn test_online_admins_only_lists_admins() {
    let app = TestApp::new().await;
    let client = token_for(CLIENT_ID, UserRole::Client);
    let admin = token_for(ADMIN_ID, UserRole::Admin);

    app.post_auth("/api/chat/online", &client).await;
    let json = body_json(app.get_auth("/api/chat/admins/online", &client).await).await;
    assert_eq!(json, json!({"admin_ids": [], "any_online": false}));

    app.post_auth("/api/chat/online", &admin).await;
    let json = body_json(app.get_auth("/api/chat/admins/online", &client).await).await;
    assert_eq!(json, json!({"admin_ids": [ADMIN_ID], "any_online": true}));
}

#[tokio::test]
async fn test_user_status_is_admin_only() {
    let app = TestApp::new().await;
    let client = token_for(CLIENT_ID, UserRole::Client);

    let response = app
        .get_auth(&format!("/api/chat/users/{}/status", ADMIN_ID), &client)
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], 10004);
}
