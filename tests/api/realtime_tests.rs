//! Chat relay tests on the in-memory broker

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tokio::time::timeout;

use rental_chat::application::services::ChatService;
use rental_chat::domain::{ChatEvent, EquipmentRequestData, MessageKind, MessagePayload};
use rental_chat::infrastructure::memory::MemoryBroker;
use rental_chat::infrastructure::realtime::TransportError;

use crate::common::test_settings;

fn chat_on(broker: Arc<MemoryBroker>) -> ChatService {
    ChatService::with_backend(broker, &test_settings().chat)
}

fn text(id: i64, message: &str) -> MessagePayload {
    MessagePayload {
        id,
        message: message.into(),
        message_type: None,
        equipment_id: None,
        equipment_name: None,
    }
}

/// Register a handler for `user_id` that forwards into a channel
async fn listen(chat: &ChatService, user_id: i64) -> mpsc::UnboundedReceiver<ChatEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    chat.relay().register_handler(
        user_id,
        Arc::new(move |event| {
            let _ = tx.send(event);
        }),
    );
    chat.relay().subscribe(user_id).await.unwrap();
    rx
}

async fn next(rx: &mut mpsc::UnboundedReceiver<ChatEvent>) -> ChatEvent {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("event not delivered in time")
        .expect("handler channel closed")
}

#[tokio::test]
async fn test_message_published_to_recipient_channel() {
    let broker = Arc::new(MemoryBroker::new());
    let chat = chat_on(broker.clone());
    assert!(chat.initialize().await);
    let mut admin_rx = listen(&chat, 2).await;
    assert!(broker.is_subscribed("chat:user:2"));

    let sent = chat
        .send_message(42, 2, text(101, "Need a generator"))
        .await
        .unwrap();

    let received = next(&mut admin_rx).await;
    assert_eq!(received.id, 101);
    assert_eq!(received.from_user_id, 42);
    assert_eq!(received.to_user_id, 2);
    assert_eq!(received.message, "Need a generator");
    assert_eq!(received.message_type, MessageKind::Text);
    assert_eq!(received.created_at, sent.created_at);
    assert!(received.timestamp > 0);
}

#[tokio::test]
async fn test_handler_never_sees_other_users_events() {
    let chat = chat_on(Arc::new(MemoryBroker::new()));
    chat.initialize().await;
    let mut rx_a = listen(&chat, 7).await;
    let mut rx_b = listen(&chat, 8).await;

    chat.send_message(1, 8, text(1, "for b")).await.unwrap();
    assert_eq!(next(&mut rx_b).await.to_user_id, 8);

    chat.send_message(1, 7, text(2, "for a")).await.unwrap();
    let event = next(&mut rx_a).await;
    assert_eq!(event.id, 2);
    assert!(rx_a.try_recv().is_err());
}

#[tokio::test]
async fn test_every_handler_of_a_user_receives_the_event() {
    let chat = chat_on(Arc::new(MemoryBroker::new()));
    chat.initialize().await;
    let mut first = listen(&chat, 2).await;
    let mut second = listen(&chat, 2).await;
    assert_eq!(chat.relay().handler_count(2), 2);

    chat.send_message(42, 2, text(5, "hi")).await.unwrap();

    assert_eq!(next(&mut first).await.id, 5);
    assert_eq!(next(&mut second).await.id, 5);
}

#[tokio::test]
async fn test_equipment_request_event_carries_details() {
    let chat = chat_on(Arc::new(MemoryBroker::new()));
    chat.initialize().await;
    let mut admin_rx = listen(&chat, 2).await;

    let equipment = EquipmentRequestData {
        equipment_id: 9,
        equipment_name: "Scissor Lift".into(),
        category: Some("Access".into()),
        base_price: Some(120.0),
    };
    chat.send_equipment_request(42, 2, &equipment, 77).await.unwrap();

    let event = next(&mut admin_rx).await;
    assert_eq!(event.id, 77);
    assert_eq!(event.message_type, MessageKind::EquipmentRequest);
    assert_eq!(event.equipment_id, Some(9));
    let details = event.equipment_details.unwrap();
    assert_eq!(details.equipment_name, "Scissor Lift");
    assert_eq!(details.base_price, Some(120.0));
}

#[tokio::test]
async fn test_unreachable_transport_degrades_without_panicking() {
    let chat = chat_on(Arc::new(MemoryBroker::unreachable()));

    assert!(!chat.initialize().await);
    assert!(!chat.is_connected());

    let err = chat.send_message(42, 2, text(1, "hello")).await.unwrap_err();
    assert!(matches!(err, TransportError::NotConnected));

    chat.set_user_online(42).await;
    assert!(chat.get_online_users().await.is_empty());
    assert!(!chat.is_user_online(42).await);
}
