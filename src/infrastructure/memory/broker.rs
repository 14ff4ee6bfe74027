//! In-process presence store and pub/sub transport.
//!
//! Behaves like [`RedisBroker`](crate::infrastructure::realtime::RedisBroker)
//! for a single process: keys expire on the tokio clock, `KEYS` understands a
//! trailing `*`, and a publish only reaches the inbound stream when its channel
//! is subscribed.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use tokio::sync::broadcast;
use tokio::time::{Duration, Instant};
use tracing::debug;

use crate::infrastructure::realtime::{
    InboundMessage, KeyValueStore, PubSubBackend, TransportError, INBOUND_BUFFER,
};

/// Single-process broker used by tests and local runs without Redis.
pub struct MemoryBroker {
    entries: DashMap<String, (String, Instant)>,
    subscriptions: DashSet<String>,
    connected: AtomicBool,
    reachable: bool,
    inbound_tx: broadcast::Sender<InboundMessage>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::with_reachability(true)
    }

    /// A broker whose `connect` always fails, for exercising degraded mode.
    pub fn unreachable() -> Self {
        Self::with_reachability(false)
    }

    fn with_reachability(reachable: bool) -> Self {
        let (inbound_tx, _) = broadcast::channel(INBOUND_BUFFER);
        Self {
            entries: DashMap::new(),
            subscriptions: DashSet::new(),
            connected: AtomicBool::new(false),
            reachable,
            inbound_tx,
        }
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }

    /// Whether a channel currently has a subscription.
    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.subscriptions.contains(channel)
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_pattern(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

#[async_trait]
impl KeyValueStore for MemoryBroker {
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), TransportError> {
        self.ensure_connected()?;
        let expires_at = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries.insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool, TransportError> {
        self.ensure_connected()?;
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, (_, expires_at))| expires_at > now))
    }

    async fn exists(&self, key: &str) -> Result<bool, TransportError> {
        self.ensure_connected()?;
        let now = Instant::now();
        Ok(self
            .entries
            .get(key)
            .is_some_and(|entry| entry.value().1 > now))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, TransportError> {
        self.ensure_connected()?;
        let now = Instant::now();
        self.entries.retain(|_, (_, expires_at)| *expires_at > now);
        Ok(self
            .entries
            .iter()
            .filter(|entry| matches_pattern(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect())
    }
}

#[async_trait]
impl PubSubBackend for MemoryBroker {
    async fn connect(&self) -> Result<(), TransportError> {
        if !self.reachable {
            return Err(TransportError::Connect("memory broker is unreachable".into()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish(&self, channel: &str, payload: String) -> Result<usize, TransportError> {
        self.ensure_connected()?;
        if !self.subscriptions.contains(channel) {
            debug!(channel = %channel, "No subscriber for channel");
            return Ok(0);
        }
        let _ = self.inbound_tx.send(InboundMessage {
            channel: channel.to_string(),
            payload,
        });
        Ok(1)
    }

    async fn subscribe(&self, channel: &str) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.subscriptions.insert(channel.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.subscriptions.remove(channel);
        Ok(())
    }

    fn inbound(&self) -> broadcast::Receiver<InboundMessage> {
        self.inbound_tx.subscribe()
    }
}

impl std::fmt::Debug for MemoryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBroker")
            .field("connected", &self.is_connected())
            .field("keys", &self.entries.len())
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}
