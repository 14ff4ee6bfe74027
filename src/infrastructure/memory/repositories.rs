//! In-memory repository implementations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use crate::domain::{
    ChatMessage, ChatMessageRepository, Conversation, ConversationPair, ConversationRepository,
    NewChatMessage, NotificationLedger, NotificationLedgerEntry, UserContact, UserDirectory,
};
use crate::shared::error::AppError;

/// Conversations keyed by canonical pair.
#[derive(Debug, Default)]
pub struct MemoryConversationRepository {
    rows: DashMap<ConversationPair, Conversation>,
    next_id: AtomicI64,
}

impl MemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl ConversationRepository for MemoryConversationRepository {
    async fn upsert_last_message(
        &self,
        pair: ConversationPair,
        message_id: i64,
        preview: String,
        at: DateTime<Utc>,
    ) -> Result<Conversation, AppError> {
        let mut row = self.rows.entry(pair).or_insert_with(|| Conversation {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            user1_id: pair.user1_id(),
            user2_id: pair.user2_id(),
            last_message: None,
            last_message_id: None,
            created_at: at,
            updated_at: at,
        });
        row.last_message = Some(preview);
        row.last_message_id = Some(message_id);
        row.updated_at = at;
        Ok(row.value().clone())
    }

    async fn list_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<Conversation>, AppError> {
        let mut rows: Vec<Conversation> = self
            .rows
            .iter()
            .filter(|row| row.key().contains(user_id))
            .map(|row| row.value().clone())
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }
}

/// Append-only message log.
#[derive(Debug, Default)]
pub struct MemoryChatMessageRepository {
    rows: RwLock<Vec<ChatMessage>>,
}

impl MemoryChatMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored message, oldest first.
    pub fn all(&self) -> Vec<ChatMessage> {
        self.rows.read().clone()
    }
}

#[async_trait]
impl ChatMessageRepository for MemoryChatMessageRepository {
    async fn create(&self, message: NewChatMessage) -> Result<ChatMessage, AppError> {
        let mut rows = self.rows.write();
        let row = ChatMessage {
            id: rows.len() as i64 + 1,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            message: message.message,
            message_type: message.message_type,
            equipment_id: message.equipment_id,
            equipment_name: message.equipment_name,
            is_read: false,
            created_at: Utc::now(),
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn list_between(
        &self,
        pair: ConversationPair,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, AppError> {
        let rows = self.rows.read();
        Ok(rows
            .iter()
            .rev()
            .filter(|m| {
                ConversationPair::new(m.sender_id, m.receiver_id).is_ok_and(|p| p == pair)
            })
            .filter(|m| before.map_or(true, |id| m.id < id))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, reader_id: i64, sender_id: i64) -> Result<u64, AppError> {
        let mut touched = 0;
        for m in self.rows.write().iter_mut() {
            if m.receiver_id == reader_id && m.sender_id == sender_id && !m.is_read {
                m.is_read = true;
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn count_unread(&self, user_id: i64) -> Result<i64, AppError> {
        Ok(self
            .rows
            .read()
            .iter()
            .filter(|m| m.receiver_id == user_id && !m.is_read)
            .count() as i64)
    }
}

/// Notification ledger guarded by a single lock so `claim` is atomic.
#[derive(Debug, Default)]
pub struct MemoryNotificationLedger {
    entries: Mutex<HashMap<(i64, i64), NotificationLedgerEntry>>,
}

impl MemoryNotificationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite an entry.
    pub fn insert(&self, entry: NotificationLedgerEntry) {
        self.entries
            .lock()
            .insert((entry.sender_id, entry.recipient_id), entry);
    }

    /// Current entry for a direction, if any.
    pub fn get(&self, sender_id: i64, recipient_id: i64) -> Option<NotificationLedgerEntry> {
        self.entries.lock().get(&(sender_id, recipient_id)).cloned()
    }
}

#[async_trait]
impl NotificationLedger for MemoryNotificationLedger {
    async fn find(
        &self,
        sender_id: i64,
        recipient_id: i64,
    ) -> Result<Option<NotificationLedgerEntry>, AppError> {
        Ok(self.get(sender_id, recipient_id))
    }

    async fn claim(
        &self,
        sender_id: i64,
        recipient_id: i64,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Option<i32>, AppError> {
        let mut entries = self.entries.lock();
        match entries.get_mut(&(sender_id, recipient_id)) {
            None => {
                entries.insert(
                    (sender_id, recipient_id),
                    NotificationLedgerEntry {
                        sender_id,
                        recipient_id,
                        last_sent_at: now,
                        notification_count: 1,
                    },
                );
                Ok(Some(1))
            }
            Some(entry) if entry.is_due(now, window) => {
                entry.last_sent_at = now;
                entry.notification_count += 1;
                Ok(Some(entry.notification_count))
            }
            Some(_) => Ok(None),
        }
    }
}

/// Fixed set of portal users.
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: DashMap<i64, UserContact>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, contact: UserContact) {
        self.users.insert(contact.id, contact);
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_contact(&self, user_id: i64) -> Result<Option<UserContact>, AppError> {
        Ok(self.users.get(&user_id).map(|u| u.value().clone()))
    }

    async fn admin_ids(&self) -> Result<Vec<i64>, AppError> {
        let mut ids: Vec<i64> = self
            .users
            .iter()
            .filter(|u| u.role.is_admin())
            .map(|u| u.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}
