//! Redis Broker
//!
//! Redis-backed implementation of the presence and pub/sub traits.
//!
//! Two connections are held once connected:
//! - a `ConnectionManager` for `SETEX`/`DEL`/`EXISTS`/`KEYS`/`PUBLISH` with
//!   automatic reconnection
//! - a dedicated pub/sub connection, split into a sink for
//!   `SUBSCRIBE`/`UNSUBSCRIBE` and a stream drained by a background task that
//!   forwards every message to the inbound broadcast channel
//!
//! When the pub/sub stream ends the reader task reopens it with exponential
//! backoff and re-subscribes every channel still wanted. Commands keep
//! flowing through the `ConnectionManager` in the meantime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashSet;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use redis::aio::{ConnectionManager, PubSubSink, PubSubStream};
use redis::{AsyncCommands, Client, RedisError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::{InboundMessage, KeyValueStore, PubSubBackend, TransportError, INBOUND_BUFFER};
use crate::config::RedisSettings;

const RECONNECT_MIN_DELAY: Duration = Duration::from_millis(500);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Subscriber role, shared with the reader task.
#[derive(Default)]
struct Subscriber {
    sink: RwLock<Option<PubSubSink>>,
    /// Channels that should be subscribed, restored after a reconnect
    channels: DashSet<String>,
    up: AtomicBool,
}

/// Redis presence store and pub/sub transport.
pub struct RedisBroker {
    /// Invalid settings are kept as the error and reported by `connect`
    client: Result<Client, String>,
    publisher: RwLock<Option<ConnectionManager>>,
    subscriber: Arc<Subscriber>,
    reader: Mutex<Option<JoinHandle<()>>>,
    inbound_tx: broadcast::Sender<InboundMessage>,
}

impl RedisBroker {
    /// Creates an unconnected broker.
    ///
    /// Never fails: a URL redis cannot parse is logged and surfaces as a
    /// [`TransportError::Connect`] from [`PubSubBackend::connect`].
    pub fn new(settings: &RedisSettings) -> Self {
        let client = Client::open(settings.connection_url()).map_err(|e| {
            error!(host = %settings.host, port = settings.port, error = %e, "Invalid Redis configuration");
            format!("invalid redis configuration: {}", e)
        });
        let (inbound_tx, _) = broadcast::channel(INBOUND_BUFFER);

        Self {
            client,
            publisher: RwLock::new(None),
            subscriber: Arc::new(Subscriber::default()),
            reader: Mutex::new(None),
            inbound_tx,
        }
    }

    fn publisher(&self) -> Result<ConnectionManager, TransportError> {
        self.publisher.read().clone().ok_or(TransportError::NotConnected)
    }

    fn sink(&self) -> Result<PubSubSink, TransportError> {
        self.subscriber.sink.read().clone().ok_or(TransportError::NotConnected)
    }
}

/// Open a pub/sub connection and subscribe every wanted channel on it.
async fn open_subscriber(client: &Client, subscriber: &Subscriber) -> Result<PubSubStream, RedisError> {
    let (mut sink, stream) = client.get_async_pubsub().await?.split();
    let wanted: Vec<String> = subscriber.channels.iter().map(|c| c.key().clone()).collect();
    for channel in &wanted {
        sink.subscribe(channel).await?;
    }
    *subscriber.sink.write() = Some(sink.clone());

    // Channels added while the sink was being set up
    let late: Vec<String> = subscriber
        .channels
        .iter()
        .map(|c| c.key().clone())
        .filter(|c| !wanted.contains(c))
        .collect();
    for channel in &late {
        sink.subscribe(channel).await?;
    }
    subscriber.up.store(true, Ordering::SeqCst);
    Ok(stream)
}

/// Backoff before reconnect attempt `attempt` (0-based).
fn reconnect_delay(attempt: u32) -> Duration {
    RECONNECT_MIN_DELAY
        .saturating_mul(1u32 << attempt.min(16))
        .min(RECONNECT_MAX_DELAY)
}

async fn run_reader(
    client: Client,
    mut stream: PubSubStream,
    subscriber: Arc<Subscriber>,
    tx: broadcast::Sender<InboundMessage>,
) {
    loop {
        while let Some(msg) = stream.next().await {
            let channel = msg.get_channel_name().to_string();
            match msg.get_payload::<String>() {
                Ok(payload) => {
                    // No receivers just means nobody is relaying right now.
                    let _ = tx.send(InboundMessage { channel, payload });
                }
                Err(e) => {
                    warn!(channel = %channel, error = %e, "Dropping non-text pub/sub payload");
                }
            }
        }

        subscriber.up.store(false, Ordering::SeqCst);
        *subscriber.sink.write() = None;
        warn!("Redis subscriber stream ended; reconnecting");

        let mut attempt = 0;
        stream = loop {
            tokio::time::sleep(reconnect_delay(attempt)).await;
            match open_subscriber(&client, &subscriber).await {
                Ok(stream) => break stream,
                Err(e) => {
                    warn!(attempt = attempt, error = %e, "Redis subscriber reconnect failed");
                    attempt = attempt.saturating_add(1);
                }
            }
        };
        info!(
            channels = subscriber.channels.len(),
            "Redis subscriber reconnected"
        );
    }
}

#[async_trait]
impl KeyValueStore for RedisBroker {
    #[instrument(skip(self, value), level = "debug")]
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), TransportError> {
        let mut conn = self.publisher()?;
        conn.set_ex::<_, _, ()>(key, value, ttl_secs).await?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn del(&self, key: &str) -> Result<bool, TransportError> {
        let mut conn = self.publisher()?;
        let deleted: i64 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    #[instrument(skip(self), level = "debug")]
    async fn exists(&self, key: &str) -> Result<bool, TransportError> {
        let mut conn = self.publisher()?;
        let found: bool = conn.exists(key).await?;
        Ok(found)
    }

    #[instrument(skip(self), level = "debug")]
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, TransportError> {
        let mut conn = self.publisher()?;
        let found: Vec<String> = conn.keys(pattern).await?;
        Ok(found)
    }
}

#[async_trait]
impl PubSubBackend for RedisBroker {
    async fn connect(&self) -> Result<(), TransportError> {
        if self.publisher.read().is_some() {
            return Ok(());
        }
        let client = self
            .client
            .as_ref()
            .map_err(|e| TransportError::Connect(e.clone()))?;

        info!("Connecting realtime transport to Redis...");
        let manager = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let stream = open_subscriber(client, &self.subscriber)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let reader = tokio::spawn(run_reader(
            client.clone(),
            stream,
            self.subscriber.clone(),
            self.inbound_tx.clone(),
        ));
        if let Some(previous) = self.reader.lock().replace(reader) {
            previous.abort();
        }
        *self.publisher.write() = Some(manager);

        info!("Realtime transport connected");
        Ok(())
    }

    /// Both roles are up. Commands may still succeed while the subscriber
    /// is reconnecting.
    fn is_connected(&self) -> bool {
        self.publisher.read().is_some() && self.subscriber.up.load(Ordering::SeqCst)
    }

    #[instrument(skip(self, payload), level = "debug")]
    async fn publish(&self, channel: &str, payload: String) -> Result<usize, TransportError> {
        let mut conn = self.publisher()?;
        let receivers: i64 = conn.publish(channel, payload).await?;
        debug!(channel = %channel, receivers = receivers, "Published chat event");
        Ok(receivers.max(0) as usize)
    }

    /// The channel is remembered even when the subscriber is down, so a
    /// reconnect picks it up.
    #[instrument(skip(self), level = "debug")]
    async fn subscribe(&self, channel: &str) -> Result<(), TransportError> {
        self.subscriber.channels.insert(channel.to_owned());
        let mut sink = self.sink()?;
        sink.subscribe(channel).await?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn unsubscribe(&self, channel: &str) -> Result<(), TransportError> {
        self.subscriber.channels.remove(channel);
        let mut sink = self.sink()?;
        sink.unsubscribe(channel).await?;
        Ok(())
    }

    fn inbound(&self) -> broadcast::Receiver<InboundMessage> {
        self.inbound_tx.subscribe()
    }
}

impl Drop for RedisBroker {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}

impl std::fmt::Debug for RedisBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBroker")
            .field("connected", &self.is_connected())
            .field("channels", &self.subscriber.channels.len())
            .finish_non_exhaustive()
    }
}
