//! Chat message entity and repository trait.
//!
//! Maps to the append-only `chat_messages` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ConversationPair, MessageKind};
use crate::shared::error::AppError;

/// A persisted direct message.
///
/// Maps to the `chat_messages` table:
/// - id: BIGSERIAL PRIMARY KEY
/// - sender_id / receiver_id: BIGINT NOT NULL
/// - message: TEXT NOT NULL
/// - message_type: TEXT NOT NULL DEFAULT 'text'
/// - equipment_id / equipment_name: NULL unless an equipment request
/// - is_read: BOOLEAN NOT NULL DEFAULT FALSE
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub message: String,
    pub message_type: MessageKind,
    pub equipment_id: Option<i64>,
    pub equipment_name: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields required to insert a message row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChatMessage {
    pub sender_id: i64,
    pub receiver_id: i64,
    pub message: String,
    pub message_type: MessageKind,
    pub equipment_id: Option<i64>,
    pub equipment_name: Option<String>,
}

/// Repository trait for message rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatMessageRepository: Send + Sync {
    /// Insert a message; the id comes from the table sequence.
    async fn create(&self, message: NewChatMessage) -> Result<ChatMessage, AppError>;

    /// Messages exchanged within a pair, newest first, optionally before a message id.
    async fn list_between(
        &self,
        pair: ConversationPair,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, AppError>;

    /// Mark messages sent by `sender_id` to `reader_id` as read; returns rows touched.
    async fn mark_read(&self, reader_id: i64, sender_id: i64) -> Result<u64, AppError>;

    /// Unread messages addressed to a user.
    async fn count_unread(&self, user_id: i64) -> Result<i64, AppError>;
}
