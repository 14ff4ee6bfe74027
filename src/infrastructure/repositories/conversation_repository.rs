//! Conversation Repository Implementation
//!
//! PostgreSQL implementation of the ConversationRepository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Conversation, ConversationPair, ConversationRepository};
use crate::shared::error::AppError;

/// Database row representation matching the chat_conversations table schema.
#[derive(Debug, sqlx::FromRow)]
struct ConversationRow {
    id: i64,
    user1_id: i64,
    user2_id: i64,
    last_message: Option<String>,
    last_message_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Conversation {
            id: row.id,
            user1_id: row.user1_id,
            user2_id: row.user2_id,
            last_message: row.last_message,
            last_message_id: row.last_message_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// PostgreSQL conversation repository implementation.
#[derive(Clone)]
pub struct PgConversationRepository {
    pool: PgPool,
}

impl PgConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationRepository for PgConversationRepository {
    async fn upsert_last_message(
        &self,
        pair: ConversationPair,
        message_id: i64,
        preview: String,
        at: DateTime<Utc>,
    ) -> Result<Conversation, AppError> {
        let row = sqlx::query_as::<_, ConversationRow>(
            r#"
            INSERT INTO chat_conversations (user1_id, user2_id, last_message, last_message_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (user1_id, user2_id) DO UPDATE
            SET last_message = EXCLUDED.last_message,
                last_message_id = EXCLUDED.last_message_id,
                updated_at = EXCLUDED.updated_at
            RETURNING id, user1_id, user2_id, last_message, last_message_id, created_at, updated_at
            "#,
        )
        .bind(pair.user1_id())
        .bind(pair.user2_id())
        .bind(preview)
        .bind(message_id)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn list_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<Conversation>, AppError> {
        let rows = sqlx::query_as::<_, ConversationRow>(
            r#"
            SELECT id, user1_id, user2_id, last_message, last_message_id, created_at, updated_at
            FROM chat_conversations
            WHERE user1_id = $1 OR user2_id = $1
            ORDER BY updated_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
