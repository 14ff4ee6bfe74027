//! Chat Service
//!
//! Entry point of the real-time layer: presence plus per-user event delivery.
//!
//! The service holds no message state. Callers persist a message first and
//! only then publish it, so a delivery failure never loses data.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ChatSettings;
use crate::domain::{ChatEvent, EquipmentRequestData, MessagePayload};
use crate::infrastructure::realtime::{
    ChannelRelay, EventHandler, HandlerId, KeyValueStore, PresenceCache, PubSubBackend,
    TransportError,
};

/// Presence and message relay for the chat routes.
#[derive(Debug, Clone)]
pub struct ChatService {
    presence: PresenceCache,
    relay: Arc<ChannelRelay>,
}

impl ChatService {
    pub fn new(presence: PresenceCache, relay: Arc<ChannelRelay>) -> Self {
        Self { presence, relay }
    }

    /// Build presence and relay on one backend serving both roles.
    pub fn with_backend<B>(backend: Arc<B>, settings: &ChatSettings) -> Self
    where
        B: KeyValueStore + PubSubBackend + 'static,
    {
        let presence = PresenceCache::new(
            backend.clone(),
            settings.presence_prefix.as_str(),
            settings.presence_ttl_secs,
        );
        let relay = ChannelRelay::new(backend, settings.channel_prefix.as_str());
        Self::new(presence, Arc::new(relay))
    }

    /// Connect the transport. Never fails the caller.
    ///
    /// Returns whether the transport is connected afterwards. On failure the
    /// service keeps running in degraded mode: presence reads come back empty
    /// and publishes return [`TransportError::NotConnected`].
    pub async fn initialize(&self) -> bool {
        match self.relay.connect().await {
            Ok(()) => {
                info!("Chat service initialized");
                true
            }
            Err(e) => {
                error!(error = %e, "Chat transport unavailable; continuing without real-time delivery");
                false
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.relay.is_connected()
    }

    pub fn relay(&self) -> &Arc<ChannelRelay> {
        &self.relay
    }

    pub fn presence_ttl_secs(&self) -> u64 {
        self.presence.ttl_secs()
    }

    /// Mark a user online or refresh their presence.
    pub async fn set_user_online(&self, user_id: i64) {
        self.presence.set_online(user_id).await;
    }

    pub async fn set_user_offline(&self, user_id: i64) {
        self.presence.set_offline(user_id).await;
    }

    pub async fn get_online_users(&self) -> Vec<i64> {
        self.presence.online_users().await
    }

    pub async fn is_user_online(&self, user_id: i64) -> bool {
        self.presence.is_online(user_id).await
    }

    /// Start a live session: register the handler, subscribe the user's
    /// channel and mark them online.
    ///
    /// Runs under the user's lock, so it never interleaves with
    /// [`ChatService::detach_session`] of another session of the same user.
    pub async fn attach_session(&self, user_id: i64, handler: EventHandler) -> HandlerId {
        let guard = self.relay.lock_user(user_id).await;
        let id = self.relay.register_handler(user_id, handler);
        if let Err(e) = self.relay.subscribe(user_id).await {
            warn!(user_id = user_id, error = %e, "Live delivery unavailable for this session");
        }
        self.presence.set_online(user_id).await;
        drop(guard);
        id
    }

    /// End a live session.
    ///
    /// The channel is unsubscribed and the user marked offline only when this
    /// was their last session. Returns whether that happened.
    pub async fn detach_session(&self, user_id: i64, id: HandlerId) -> bool {
        let guard = self.relay.lock_user(user_id).await;
        self.relay.remove_handler(user_id, id);
        let last = self.relay.handler_count(user_id) == 0;
        if last {
            if let Err(e) = self.relay.unsubscribe(user_id).await {
                debug!(user_id = user_id, error = %e, "Unsubscribe skipped");
            }
            self.presence.set_offline(user_id).await;
        }
        drop(guard);
        if last {
            self.relay.release_user_lock(user_id);
        }
        last
    }

    /// Publish a message event to the recipient's channel.
    #[instrument(skip(self, payload), fields(message_id = payload.id))]
    pub async fn send_message(
        &self,
        from_user_id: i64,
        to_user_id: i64,
        payload: MessagePayload,
    ) -> Result<ChatEvent, TransportError> {
        let event = ChatEvent::message(from_user_id, to_user_id, payload, Utc::now());
        self.relay.publish(to_user_id, &event).await?;
        Ok(event)
    }

    /// Publish an equipment-request event to an admin's channel.
    #[instrument(skip(self, data), fields(equipment_id = data.equipment_id))]
    pub async fn send_equipment_request(
        &self,
        client_id: i64,
        admin_id: i64,
        data: &EquipmentRequestData,
        message_id: i64,
    ) -> Result<ChatEvent, TransportError> {
        let event = ChatEvent::equipment_request(client_id, admin_id, data, message_id, Utc::now());
        self.relay.publish(admin_id, &event).await?;
        Ok(event)
    }
}
