//! WebSocket frames exchanged with chat clients.

use serde::{Deserialize, Serialize};

use crate::domain::ChatEvent;

/// Frames sent to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// First frame after the upgrade
    Ready {
        user_id: i64,
        /// Send a ping at least this often to stay online
        heartbeat_interval_secs: u64,
    },
    /// A chat event addressed to this user
    Message { event: ChatEvent },
    /// Answer to a client ping
    Pong,
}

/// Frames accepted from the client.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Heartbeat; refreshes presence
    Ping,
}
