//! WebSocket Relay
//!
//! Streams a user's chat events to their browser.
//!
//! Each socket is one chat session: attached on connect, detached on close.
//! The user goes offline only when their last socket closes. Client pings
//! refresh presence.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Extension, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::messages::{ClientFrame, ServerFrame};
use crate::application::services::ChatService;
use crate::presentation::middleware::AuthUser;
use crate::startup::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Response {
    let chat = state.chat.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, chat, auth.user_id))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, chat: Arc<ChatService>, user_id: i64) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();

    let handler_tx = tx.clone();
    let handler_id = chat
        .attach_session(
            user_id,
            Arc::new(move |event| {
                let _ = handler_tx.send(ServerFrame::Message { event });
            }),
        )
        .await;

    let _ = tx.send(ServerFrame::Ready {
        user_id,
        heartbeat_interval_secs: (chat.presence_ttl_secs() / 3).max(1),
    });

    let sender_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(t) => t,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize frame");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(ClientFrame::Ping) => {
                    chat.set_user_online(user_id).await;
                    let _ = tx.send(ServerFrame::Pong);
                }
                Err(e) => debug!(user_id = user_id, error = %e, "Ignoring unknown client frame"),
            },
            Ok(Message::Ping(_)) => chat.set_user_online(user_id).await,
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }

    let went_offline = chat.detach_session(user_id, handler_id).await;
    sender_task.abort();

    debug!(user_id = user_id, went_offline = went_offline, "Chat socket closed");
}
