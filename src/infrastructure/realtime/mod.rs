//! Realtime Module
//!
//! Presence tracking and per-user pub/sub delivery on a shared key/value +
//! publish/subscribe backend.
//!
//! This module provides:
//! - `KeyValueStore` / `PubSubBackend` traits describing the backend commands
//!   the chat layer relies on (`SETEX`, `DEL`, `EXISTS`, `KEYS`, `PUBLISH`,
//!   `SUBSCRIBE`)
//! - `RedisBroker`, the production backend with separate publisher and
//!   subscriber connections
//! - `PresenceCache`, TTL-based online tracking that degrades to a no-op
//! - `ChannelRelay`, typed event publishing and inbound fan-out to handlers
//!
//! # Architecture
//!
//! ```text
//! +-------------------+      +-------------------+
//! |   PresenceCache   |      |   ChannelRelay    |
//! +-------------------+      +-------------------+
//!          |                          |
//!          v                          v
//! +-------------------+      +-------------------+
//! |  KeyValueStore    |      |  PubSubBackend    |  <-- Abstract interfaces
//! +-------------------+      +-------------------+
//!          \                         /
//!           v                       v
//!         +---------------------------+
//!         |  RedisBroker / Memory     |  <-- Concrete backends
//!         +---------------------------+
//! ```

mod presence;
mod redis_broker;
mod relay;

pub use presence::PresenceCache;
pub use redis_broker::RedisBroker;
pub use relay::{ChannelRelay, EventHandler, HandlerId};

use async_trait::async_trait;
use tokio::sync::broadcast;

/// Capacity of the inbound message buffer shared by all channels.
pub const INBOUND_BUFFER: usize = 1024;

/// Failure of a presence or pub/sub operation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// `connect` was never called or did not succeed.
    #[error("realtime transport is not connected")]
    NotConnected,

    /// Establishing the backend connections failed.
    #[error("failed to connect realtime transport: {0}")]
    Connect(String),

    /// An event could not be encoded or decoded.
    #[error("event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend rejected or failed a command.
    #[error("realtime backend error: {0}")]
    Remote(String),
}

impl From<redis::RedisError> for TransportError {
    fn from(err: redis::RedisError) -> Self {
        TransportError::Remote(err.to_string())
    }
}

impl TransportError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::NotConnected => "not_connected",
            TransportError::Connect(_) => "connect",
            TransportError::Serialization(_) => "serialization",
            TransportError::Remote(_) => "remote",
        }
    }
}

/// Raw message received on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub channel: String,
    pub payload: String,
}

/// Expiring key/value commands used for presence.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Set `key` to `value`, expiring after `ttl_secs`.
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), TransportError>;

    /// Delete `key`; returns whether it existed.
    async fn del(&self, key: &str) -> Result<bool, TransportError>;

    /// Whether `key` currently exists and has not expired.
    async fn exists(&self, key: &str) -> Result<bool, TransportError>;

    /// Live keys matching a glob pattern such as `chat:online:*`.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, TransportError>;
}

/// Publish/subscribe commands used for real-time delivery.
///
/// Implementations keep a publishing role and a subscribing role, set up
/// once by [`PubSubBackend::connect`]. Every other call short-circuits with
/// [`TransportError::NotConnected`] until that succeeded. A dropped
/// subscriber is expected to come back on its own with every channel that
/// was subscribed at the time.
#[async_trait]
pub trait PubSubBackend: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;

    /// Both roles are currently usable.
    fn is_connected(&self) -> bool;

    /// Publish a payload; returns the number of receivers reported by the backend.
    async fn publish(&self, channel: &str, payload: String) -> Result<usize, TransportError>;

    async fn subscribe(&self, channel: &str) -> Result<(), TransportError>;

    async fn unsubscribe(&self, channel: &str) -> Result<(), TransportError>;

    /// Stream of messages arriving on subscribed channels.
    fn inbound(&self) -> broadcast::Receiver<InboundMessage>;
}

/// Key and channel naming.
pub mod keys {
    /// Presence key for a user ("chat:online:" + 42 -> "chat:online:42")
    #[inline]
    pub fn presence(prefix: &str, user_id: i64) -> String {
        format!("{}{}", prefix, user_id)
    }

    /// Glob matching every presence key under `prefix`
    #[inline]
    pub fn presence_pattern(prefix: &str) -> String {
        format!("{}*", prefix)
    }

    /// Pub/sub channel of a user ("chat:user:" + 2 -> "chat:user:2")
    #[inline]
    pub fn channel(prefix: &str, user_id: i64) -> String {
        format!("{}{}", prefix, user_id)
    }

    /// Recover the user id from a prefixed key or channel name.
    pub fn user_id_from(prefix: &str, name: &str) -> Option<i64> {
        name.strip_prefix(prefix)?.parse().ok()
    }
}
