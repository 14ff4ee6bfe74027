//! Presence Cache
//!
//! TTL-based online tracking. A user is online while their presence key
//! exists; keys expire on their own when heartbeats stop.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{keys, KeyValueStore};

/// Sentinel stored under every presence key.
const ONLINE: &str = "1";

/// Presence tracking on top of an expiring key/value store.
///
/// Failures of the store are logged and swallowed: presence is best-effort
/// and never fails a chat request.
#[derive(Clone)]
pub struct PresenceCache {
    store: Arc<dyn KeyValueStore>,
    prefix: Arc<str>,
    ttl_secs: u64,
}

impl PresenceCache {
    /// Create a presence cache
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: impl Into<Arc<str>>, ttl_secs: u64) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            ttl_secs,
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Mark a user online, or refresh the TTL if already online.
    pub async fn set_online(&self, user_id: i64) {
        let key = keys::presence(&self.prefix, user_id);
        match self.store.set_ex(&key, ONLINE, self.ttl_secs).await {
            Ok(()) => debug!(user_id = user_id, ttl = self.ttl_secs, "User online"),
            Err(e) => warn!(user_id = user_id, error = %e, "Presence update skipped"),
        }
    }

    /// Remove a user's presence key.
    pub async fn set_offline(&self, user_id: i64) {
        let key = keys::presence(&self.prefix, user_id);
        match self.store.del(&key).await {
            Ok(existed) => debug!(user_id = user_id, existed = existed, "User offline"),
            Err(e) => warn!(user_id = user_id, error = %e, "Presence removal skipped"),
        }
    }

    /// Ids of every user holding a live presence key, ascending.
    ///
    /// Returns an empty list when the store is unreachable.
    pub async fn online_users(&self) -> Vec<i64> {
        let pattern = keys::presence_pattern(&self.prefix);
        let found = match self.store.keys(&pattern).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Presence lookup failed; reporting nobody online");
                return Vec::new();
            }
        };

        let mut users: Vec<i64> = found
            .iter()
            .filter_map(|key| keys::user_id_from(&self.prefix, key))
            .collect();
        users.sort_unstable();
        users.dedup();
        users
    }

    /// Whether a single user currently holds a presence key.
    ///
    /// `false` when the store is unreachable.
    pub async fn is_online(&self, user_id: i64) -> bool {
        let key = keys::presence(&self.prefix, user_id);
        match self.store.exists(&key).await {
            Ok(found) => found,
            Err(e) => {
                warn!(user_id = user_id, error = %e, "Presence lookup failed; reporting offline");
                false
            }
        }
    }
}

impl std::fmt::Debug for PresenceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceCache")
            .field("prefix", &self.prefix)
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}
