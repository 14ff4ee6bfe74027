//! Channel Relay
//!
//! Typed delivery of [`ChatEvent`]s over per-user pub/sub channels.
//!
//! Outbound, an event is serialized and published on the recipient's
//! channel. Inbound, a dispatcher task drains the backend's message stream,
//! recovers the user id from the channel name, decodes the event and hands it
//! to every handler registered for that user. A malformed message is logged
//! and dropped without stopping the dispatcher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{keys, InboundMessage, PubSubBackend, TransportError};
use crate::domain::ChatEvent;
use crate::infrastructure::metrics;

/// Callback invoked for each event addressed to a user. Must not block.
pub type EventHandler = Arc<dyn Fn(ChatEvent) + Send + Sync>;

/// Identifies one registered handler so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type HandlerMap = DashMap<i64, Vec<(HandlerId, EventHandler)>>;

/// Per-user channel publishing and inbound fan-out.
pub struct ChannelRelay {
    backend: Arc<dyn PubSubBackend>,
    channel_prefix: Arc<str>,
    handlers: Arc<HandlerMap>,
    next_handler: AtomicU64,
    /// Serializes attach/detach of one user's sessions
    user_locks: DashMap<i64, Arc<AsyncMutex<()>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelRelay {
    pub fn new(backend: Arc<dyn PubSubBackend>, channel_prefix: impl Into<Arc<str>>) -> Self {
        Self {
            backend,
            channel_prefix: channel_prefix.into(),
            handlers: Arc::new(DashMap::new()),
            next_handler: AtomicU64::new(1),
            user_locks: DashMap::new(),
            dispatcher: Mutex::new(None),
        }
    }

    /// Channel name of a user.
    pub fn channel(&self, user_id: i64) -> String {
        keys::channel(&self.channel_prefix, user_id)
    }

    pub fn is_connected(&self) -> bool {
        self.backend.is_connected()
    }

    /// Connect the backend and start the inbound dispatcher.
    ///
    /// Calling this again after a successful connect is a no-op.
    pub async fn connect(&self) -> Result<(), TransportError> {
        self.backend.connect().await?;

        let mut dispatcher = self.dispatcher.lock();
        if dispatcher.is_none() {
            *dispatcher = Some(self.spawn_dispatcher());
        }
        Ok(())
    }

    fn spawn_dispatcher(&self) -> JoinHandle<()> {
        let mut inbound = self.backend.inbound();
        let handlers = self.handlers.clone();
        let prefix = self.channel_prefix.clone();

        tokio::spawn(async move {
            loop {
                match inbound.recv().await {
                    Ok(message) => {
                        dispatch(&handlers, &prefix, message);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "Chat dispatcher lagged; events dropped");
                        metrics::record_inbound_dropped("lagged", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            info!("Chat dispatcher stopped");
        })
    }

    /// Publish an event on a user's channel.
    ///
    /// Returns the receiver count reported by the backend. Never panics;
    /// every failure comes back as a [`TransportError`].
    pub async fn publish(&self, user_id: i64, event: &ChatEvent) -> Result<usize, TransportError> {
        let result = self.try_publish(user_id, event).await;
        match &result {
            Ok(receivers) => {
                metrics::record_published(event.message_type.as_str());
                debug!(user_id = user_id, receivers = receivers, "Chat event delivered to channel");
            }
            Err(e) => {
                metrics::record_publish_failure(e.kind());
                warn!(user_id = user_id, error = %e, "Chat event not delivered in real time");
            }
        }
        result
    }

    async fn try_publish(&self, user_id: i64, event: &ChatEvent) -> Result<usize, TransportError> {
        let payload = serde_json::to_string(event)?;
        self.backend.publish(&self.channel(user_id), payload).await
    }

    /// Start receiving a user's channel.
    pub async fn subscribe(&self, user_id: i64) -> Result<(), TransportError> {
        self.backend.subscribe(&self.channel(user_id)).await
    }

    /// Stop receiving a user's channel.
    pub async fn unsubscribe(&self, user_id: i64) -> Result<(), TransportError> {
        self.backend.unsubscribe(&self.channel(user_id)).await
    }

    /// Add a handler for a user's events. Existing handlers are kept.
    pub fn register_handler(&self, user_id: i64, handler: EventHandler) -> HandlerId {
        let id = HandlerId(self.next_handler.fetch_add(1, Ordering::Relaxed));
        self.handlers.entry(user_id).or_default().push((id, handler));
        debug!(user_id = user_id, handler = id.0, "Chat handler registered");
        id
    }

    /// Remove one handler; returns whether it was registered.
    pub fn remove_handler(&self, user_id: i64, id: HandlerId) -> bool {
        let removed = match self.handlers.get_mut(&user_id) {
            Some(mut list) => {
                let before = list.len();
                list.retain(|(handler_id, _)| *handler_id != id);
                before != list.len()
            }
            None => false,
        };
        self.handlers.remove_if(&user_id, |_, list| list.is_empty());
        removed
    }

    /// Number of handlers registered for a user.
    pub fn handler_count(&self, user_id: i64) -> usize {
        self.handlers.get(&user_id).map(|list| list.len()).unwrap_or(0)
    }

    /// Exclusive access to a user's session bookkeeping.
    ///
    /// Hold the guard across a handler change and the subscribe or
    /// unsubscribe that goes with it, then drop it and call
    /// [`ChannelRelay::release_user_lock`].
    pub async fn lock_user(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let lock = self.user_locks.entry(user_id).or_default().clone();
        lock.lock_owned().await
    }

    /// Forget a user's lock once nobody holds or waits for it.
    pub fn release_user_lock(&self, user_id: i64) {
        self.user_locks
            .remove_if(&user_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Decode one inbound message and fan it out; returns how many handlers ran.
fn dispatch(handlers: &HandlerMap, prefix: &str, message: InboundMessage) -> usize {
    let Some(user_id) = keys::user_id_from(prefix, &message.channel) else {
        debug!(channel = %message.channel, "Ignoring message on foreign channel");
        return 0;
    };

    let event: ChatEvent = match serde_json::from_str(&message.payload) {
        Ok(event) => event,
        Err(e) => {
            warn!(channel = %message.channel, error = %e, "Dropping malformed chat event");
            metrics::record_inbound_dropped("malformed", 1);
            return 0;
        }
    };

    // Clone out so handlers run without holding the map shard lock.
    let targets: Vec<EventHandler> = match handlers.get(&user_id) {
        Some(list) => list.iter().map(|(_, handler)| handler.clone()).collect(),
        None => return 0,
    };

    for handler in &targets {
        handler(event.clone());
    }
    targets.len()
}

impl Drop for ChannelRelay {
    fn drop(&mut self) {
        if let Some(dispatcher) = self.dispatcher.get_mut().take() {
            dispatcher.abort();
        }
    }
}

impl std::fmt::Debug for ChannelRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRelay")
            .field("channel_prefix", &self.channel_prefix)
            .field("users_with_handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}
