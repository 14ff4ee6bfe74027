//! WebSocket relay tests over a real socket

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use rental_chat::domain::UserRole;

use crate::common::{token_for, TestApp, ADMIN_ID, CLIENT_ID};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Serve the app on an ephemeral port
async fn serve(app: &TestApp) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, user_id: i64, role: UserRole) -> Socket {
    let url = format!("ws://{}/api/chat/ws?token={}", addr, token_for(user_id, role));
    let (socket, _) = connect_async(url).await.unwrap();
    socket
}

/// Next JSON frame, skipping control frames
async fn next_frame(socket: &mut Socket) -> Value {
    loop {
        let message = timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("no frame in time")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn wait_until_offline(app: &TestApp, user_id: i64) {
    timeout(Duration::from_secs(2), async {
        while app.state.chat.is_user_online(user_id).await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("user still online after last socket closed");
}

#[tokio::test]
async fn test_ready_frame_marks_user_online() {
    let app = TestApp::new().await;
    let addr = serve(&app).await;

    let mut socket = connect(addr, ADMIN_ID, UserRole::Admin).await;

    let ready = next_frame(&mut socket).await;
    assert_eq!(ready, json!({"type": "ready", "user_id": ADMIN_ID, "heartbeat_interval_secs": 100}));
    assert!(app.state.chat.is_user_online(ADMIN_ID).await);
}

#[tokio::test]
async fn test_rejects_missing_token() {
    let app = TestApp::new().await;
    let addr = serve(&app).await;

    let result = connect_async(format!("ws://{}/api/chat/ws", addr)).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_ping_refreshes_presence_and_gets_pong() {
    let app = TestApp::new().await;
    let addr = serve(&app).await;
    let mut socket = connect(addr, CLIENT_ID, UserRole::Client).await;
    next_frame(&mut socket).await;

    // Drop the key behind the socket's back; the ping must restore it
    app.state.chat.set_user_offline(CLIENT_ID).await;
    socket.send(Message::text(r#"{"type":"ping"}"#)).await.unwrap();

    assert_eq!(next_frame(&mut socket).await, json!({"type": "pong"}));
    assert!(app.state.chat.is_user_online(CLIENT_ID).await);
}

#[tokio::test]
async fn test_message_sent_over_http_arrives_on_socket() {
    let app = TestApp::new().await;
    let addr = serve(&app).await;
    let mut socket = connect(addr, ADMIN_ID, UserRole::Admin).await;
    next_frame(&mut socket).await;

    let response = app
        .post_json_auth(
            "/api/chat/messages",
            &json!({"to_user_id": ADMIN_ID, "message": "Need a generator"}),
            &token_for(CLIENT_ID, UserRole::Client),
        )
        .await;
    assert!(response.status().is_success());

    let frame = next_frame(&mut socket).await;
    assert_eq!(frame["type"], "message");
    assert_eq!(frame["event"]["from_user_id"], CLIENT_ID);
    assert_eq!(frame["event"]["to_user_id"], ADMIN_ID);
    assert_eq!(frame["event"]["message"], "Need a generator");
    assert_eq!(frame["event"]["message_type"], "text");
}

#[tokio::test]
async fn test_user_stays_online_until_last_socket_closes() {
    let app = TestApp::new().await;
    let addr = serve(&app).await;
    let mut first = connect(addr, ADMIN_ID, UserRole::Admin).await;
    next_frame(&mut first).await;
    let mut second = connect(addr, ADMIN_ID, UserRole::Admin).await;
    next_frame(&mut second).await;

    first.close(None).await.unwrap();
    timeout(Duration::from_secs(2), async {
        while app.state.chat.relay().handler_count(ADMIN_ID) != 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("first socket never detached");

    assert!(app.state.chat.is_user_online(ADMIN_ID).await);
    assert!(app.backends.broker.is_subscribed("chat:user:2"));

    second.close(None).await.unwrap();
    wait_until_offline(&app, ADMIN_ID).await;
    assert!(!app.backends.broker.is_subscribed("chat:user:2"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reopening_tab_while_old_one_closes() {
    let app = TestApp::new().await;
    let addr = serve(&app).await;

    for _ in 0..10 {
        let mut old = connect(addr, ADMIN_ID, UserRole::Admin).await;
        next_frame(&mut old).await;

        let (closed, new) = tokio::join!(old.close(None), connect(addr, ADMIN_ID, UserRole::Admin));
        closed.unwrap();
        let mut new = new;
        next_frame(&mut new).await;

        // Whatever order the server saw, the new tab must stay live
        timeout(Duration::from_secs(2), async {
            while app.state.chat.relay().handler_count(ADMIN_ID) != 1 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("old socket never detached");
        assert!(app.state.chat.is_user_online(ADMIN_ID).await);
        assert!(app.backends.broker.is_subscribed("chat:user:2"));

        new.close(None).await.unwrap();
        wait_until_offline(&app, ADMIN_ID).await;
    }
}
