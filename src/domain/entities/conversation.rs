//! Conversation entity and repository trait.
//!
//! Maps to the `chat_conversations` table. One row exists per unordered user
//! pair; the pair is always stored as `(min, max)`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Unordered pair of distinct users in canonical `(min, max)` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationPair {
    user1_id: i64,
    user2_id: i64,
}

impl ConversationPair {
    /// Build the canonical pair. Fails when both ids are the same user.
    pub fn new(a: i64, b: i64) -> Result<Self, AppError> {
        if a == b {
            return Err(AppError::BadRequest(
                "A conversation needs two different users".into(),
            ));
        }
        Ok(Self {
            user1_id: a.min(b),
            user2_id: a.max(b),
        })
    }

    pub fn user1_id(&self) -> i64 {
        self.user1_id
    }

    pub fn user2_id(&self) -> i64 {
        self.user2_id
    }

    pub fn contains(&self, user_id: i64) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }
}

/// Represents a direct conversation between two users.
///
/// Maps to the `chat_conversations` table:
/// - id: BIGSERIAL PRIMARY KEY
/// - user1_id / user2_id: BIGINT NOT NULL, CHECK (user1_id < user2_id), UNIQUE together
/// - last_message: TEXT NULL (denormalized preview for list views)
/// - last_message_id: BIGINT NULL
/// - created_at / updated_at: TIMESTAMPTZ NOT NULL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub user1_id: i64,
    pub user2_id: i64,
    pub last_message: Option<String>,
    pub last_message_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// The participant that is not `user_id`.
    pub fn other_participant(&self, user_id: i64) -> i64 {
        if self.user1_id == user_id {
            self.user2_id
        } else {
            self.user1_id
        }
    }
}

/// Repository trait for conversation rows.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Insert the pair's row or refresh its last-message columns.
    async fn upsert_last_message(
        &self,
        pair: ConversationPair,
        message_id: i64,
        preview: String,
        at: DateTime<Utc>,
    ) -> Result<Conversation, AppError>;

    /// Conversations involving a user, most recently updated first.
    async fn list_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<Conversation>, AppError>;
}
