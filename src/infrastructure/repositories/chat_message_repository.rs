//! Chat Message Repository Implementation
//!
//! PostgreSQL implementation of the ChatMessageRepository trait.
//! History is paged newest-first with an id cursor.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{
    ChatMessage, ChatMessageRepository, ConversationPair, MessageKind, NewChatMessage,
};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct ChatMessageRow {
    id: i64,
    sender_id: i64,
    receiver_id: i64,
    message: String,
    message_type: String,
    equipment_id: Option<i64>,
    equipment_name: Option<String>,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl From<ChatMessageRow> for ChatMessage {
    fn from(row: ChatMessageRow) -> Self {
        ChatMessage {
            id: row.id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            message: row.message,
            message_type: MessageKind::from_db(&row.message_type),
            equipment_id: row.equipment_id,
            equipment_name: row.equipment_name,
            is_read: row.is_read,
            created_at: row.created_at,
        }
    }
}

/// PostgreSQL chat message repository implementation.
#[derive(Clone)]
pub struct PgChatMessageRepository {
    pool: PgPool,
}

impl PgChatMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatMessageRepository for PgChatMessageRepository {
    async fn create(&self, message: NewChatMessage) -> Result<ChatMessage, AppError> {
        let row = sqlx::query_as::<_, ChatMessageRow>(
            r#"
            INSERT INTO chat_messages (sender_id, receiver_id, message, message_type, equipment_id, equipment_name)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, sender_id, receiver_id, message, message_type, equipment_id, equipment_name,
                      is_read, created_at
            "#,
        )
        .bind(message.sender_id)
        .bind(message.receiver_id)
        .bind(&message.message)
        .bind(message.message_type.as_str())
        .bind(message.equipment_id)
        .bind(&message.equipment_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn list_between(
        &self,
        pair: ConversationPair,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, AppError> {
        let rows = sqlx::query_as::<_, ChatMessageRow>(
            r#"
            SELECT id, sender_id, receiver_id, message, message_type, equipment_id, equipment_name,
                   is_read, created_at
            FROM chat_messages
            WHERE ((sender_id = $1 AND receiver_id = $2) OR (sender_id = $2 AND receiver_id = $1))
              AND ($3::BIGINT IS NULL OR id < $3)
            ORDER BY id DESC
            LIMIT $4
            "#,
        )
        .bind(pair.user1_id())
        .bind(pair.user2_id())
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn mark_read(&self, reader_id: i64, sender_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE chat_messages
            SET is_read = TRUE
            WHERE receiver_id = $1 AND sender_id = $2 AND is_read = FALSE
            "#,
        )
        .bind(reader_id)
        .bind(sender_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn count_unread(&self, user_id: i64) -> Result<i64, AppError> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM chat_messages
            WHERE receiver_id = $1 AND is_read = FALSE
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }
}
