//! Chat API Tests
//!
//! Messaging, history and equipment requests through the HTTP routes.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use rental_chat::domain::{MessageKind, UserRole};
use rental_chat::infrastructure::memory::MemoryBroker;
use rental_chat::startup::InMemoryBackends;

use crate::common::{body_json, contact, token_for, TestApp, ADMIN_ID, CLIENT_ID};

async fn send(app: &TestApp, from: i64, role: UserRole, to: i64, message: &str) -> (StatusCode, Value) {
    let response = app
        .post_json_auth(
            "/api/chat/messages",
            &json!({"to_user_id": to, "message": message}),
            &token_for(from, role),
        )
        .await;
    let status = response.status();
    (status, body_json(response).await)
}

#[tokio::test]
async fn test_first_message_is_delivered_and_emailed_once() {
    let app = TestApp::new().await;

    let (status, first) = send(&app, CLIENT_ID, UserRole::Client, ADMIN_ID, "Need a generator").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["message"]["sender_id"], CLIENT_ID);
    assert_eq!(first["message"]["receiver_id"], ADMIN_ID);
    assert_eq!(first["message"]["message_type"], "text");
    assert_eq!(first["delivered"], true);
    assert_eq!(first["notified"], true);

    // Ten minutes later: stored and published again, but no second email
    let (status, second) = send(&app, CLIENT_ID, UserRole::Client, ADMIN_ID, "Any update?").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["notified"], false);
    assert_eq!(second["conversation_id"], first["conversation_id"]);

    let sent = app.backends.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "adam@rentals.test");
    assert_eq!(
        app.backends.ledger.get(CLIENT_ID, ADMIN_ID).unwrap().notification_count,
        1
    );
    assert_eq!(app.backends.messages.all().len(), 2);
}

#[tokio::test]
async fn test_reply_has_its_own_notification_window() {
    let app = TestApp::new().await;
    send(&app, CLIENT_ID, UserRole::Client, ADMIN_ID, "Need a generator").await;

    let (_, reply) = send(&app, ADMIN_ID, UserRole::Admin, CLIENT_ID, "Which size?").await;

    assert_eq!(reply["notified"], true);
    assert_eq!(app.backends.mailer.sent().len(), 2);
    assert_eq!(app.backends.conversations.len(), 1);
}

#[tokio::test]
async fn test_live_delivery_to_subscribed_recipient() {
    let app = TestApp::new().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let relay = app.state.chat.relay();
    relay.register_handler(
        ADMIN_ID,
        Arc::new(move |event| {
            let _ = tx.send(event);
        }),
    );
    relay.subscribe(ADMIN_ID).await.unwrap();

    let (_, body) = send(&app, CLIENT_ID, UserRole::Client, ADMIN_ID, "Need a generator").await;

    let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.id, body["message"]["id"].as_i64().unwrap());
    assert_eq!(event.from_user_id, CLIENT_ID);
    assert_eq!(event.message, "Need a generator");
}

#[tokio::test]
async fn test_message_persisted_when_transport_is_down() {
    let backends = InMemoryBackends {
        broker: Arc::new(MemoryBroker::unreachable()),
        ..Default::default()
    };
    backends.users.insert(contact(CLIENT_ID, "Cara", UserRole::Client));
    backends.users.insert(contact(ADMIN_ID, "Adam", UserRole::Admin));
    let app = TestApp::with_backends(backends).await;

    let (status, body) = send(&app, CLIENT_ID, UserRole::Client, ADMIN_ID, "Anyone there?").await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["delivered"], false);
    assert_eq!(app.backends.messages.all().len(), 1);
}

#[tokio::test]
async fn test_send_rejections() {
    let app = TestApp::new().await;

    let (status, _) = send(&app, CLIENT_ID, UserRole::Client, CLIENT_ID, "me").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, CLIENT_ID, UserRole::Client, 999, "hello?").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, CLIENT_ID, UserRole::Client, ADMIN_ID, "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, CLIENT_ID, UserRole::Client, ADMIN_ID, "   ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(app.backends.messages.all().is_empty());
}

#[tokio::test]
async fn test_history_conversations_and_read_state() {
    let app = TestApp::new().await;
    let client = token_for(CLIENT_ID, UserRole::Client);
    let admin = token_for(ADMIN_ID, UserRole::Admin);
    send(&app, CLIENT_ID, UserRole::Client, ADMIN_ID, "first").await;
    send(&app, CLIENT_ID, UserRole::Client, ADMIN_ID, "second").await;

    let history = body_json(
        app.get_auth(&format!("/api/chat/conversations/{}/messages", ADMIN_ID), &client)
            .await,
    )
    .await;
    let bodies: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message"].as_str().unwrap())
        .collect();
    assert_eq!(bodies, vec!["second", "first"]);

    let page = body_json(
        app.get_auth(
            &format!("/api/chat/conversations/{}/messages?limit=1", ADMIN_ID),
            &client,
        )
        .await,
    )
    .await;
    assert_eq!(page.as_array().unwrap().len(), 1);

    let conversations = body_json(app.get_auth("/api/chat/conversations", &admin).await).await;
    assert_eq!(conversations[0]["other_user_id"], CLIENT_ID);
    assert_eq!(conversations[0]["last_message"], "second");

    let unread = body_json(app.get_auth("/api/chat/unread-count", &admin).await).await;
    assert_eq!(unread, json!({"unread": 2}));

    let response = app
        .post_auth(&format!("/api/chat/conversations/{}/read", CLIENT_ID), &admin)
        .await;
    assert_eq!(body_json(response).await, json!({"updated": 2}));

    let unread = body_json(app.get_auth("/api/chat/unread-count", &admin).await).await;
    assert_eq!(unread, json!({"unread": 0}));
}

#[tokio::test]
async fn test_equipment_request_to_admin() {
    let app = TestApp::new().await;
    let client = token_for(CLIENT_ID, UserRole::Client);

    let response = app
        .post_json_auth(
            "/api/chat/equipment-requests",
            &json!({
                "admin_id": ADMIN_ID,
                "equipment_id": 9,
                "equipment_name": "Scissor Lift",
                "category": "Access",
                "base_price": 120.0
            }),
            &client,
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["message"]["message_type"], MessageKind::EquipmentRequest.as_str());
    assert_eq!(body["message"]["message"], "Equipment request: Scissor Lift");
    assert_eq!(body["message"]["equipment_id"], 9);
    assert_eq!(body["notified"], true);
}

#[tokio::test]
async fn test_equipment_request_requires_admin_recipient() {
    let app = TestApp::new().await;
    app.backends.users.insert(contact(43, "Cole", UserRole::Client));

    let response = app
        .post_json_auth(
            "/api/chat/equipment-requests",
            &json!({"admin_id": 43, "equipment_id": 9, "equipment_name": "Scissor Lift"}),
            &token_for(CLIENT_ID, UserRole::Client),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.backends.messages.all().is_empty());
}

#[tokio::test]
async fn test_admin_cannot_send_equipment_request() {
    let app = TestApp::new().await;

    let response = app
        .post_json_auth(
            "/api/chat/equipment-requests",
            &json!({"admin_id": ADMIN_ID, "equipment_id": 9, "equipment_name": "Scissor Lift"}),
            &token_for(ADMIN_ID, UserRole::Admin),
        )
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.backends.messages.all().is_empty());
}

#[tokio::test]
async fn test_message_length_follows_configured_limit() {
    let app = TestApp::new().await;

    let (status, _) = send(&app, CLIENT_ID, UserRole::Client, ADMIN_ID, &"x".repeat(5000)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, CLIENT_ID, UserRole::Client, ADMIN_ID, &"x".repeat(5001)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("5000"));
}
