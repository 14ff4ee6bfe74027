//! Response DTOs
//!
//! Data structures for API response bodies.

use serde::Serialize;

use crate::application::services::SendOutcome;
use crate::domain::{ChatMessage, Conversation, MessageKind};

/// Chat message response
#[derive(Debug, Serialize)]
pub struct ChatMessageResponse {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub message: String,
    pub message_type: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equipment_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equipment_name: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}

impl From<ChatMessage> for ChatMessageResponse {
    fn from(message: ChatMessage) -> Self {
        Self {
            id: message.id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            message: message.message,
            message_type: message.message_type,
            equipment_id: message.equipment_id,
            equipment_name: message.equipment_name,
            is_read: message.is_read,
            created_at: message.created_at.to_rfc3339(),
        }
    }
}

/// Send result: the stored message and what happened after persistence
#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message: ChatMessageResponse,
    pub conversation_id: i64,
    pub delivered: bool,
    pub notified: bool,
}

impl From<SendOutcome> for SendMessageResponse {
    fn from(outcome: SendOutcome) -> Self {
        Self {
            message: outcome.message.into(),
            conversation_id: outcome.conversation_id,
            delivered: outcome.delivered,
            notified: outcome.notified,
        }
    }
}

/// Conversation list entry, seen from one participant
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub id: i64,
    pub other_user_id: i64,
    pub last_message: Option<String>,
    pub last_message_id: Option<i64>,
    pub updated_at: String,
}

impl ConversationResponse {
    pub fn for_user(conversation: Conversation, user_id: i64) -> Self {
        Self {
            id: conversation.id,
            other_user_id: conversation.other_participant(user_id),
            last_message: conversation.last_message,
            last_message_id: conversation.last_message_id,
            updated_at: conversation.updated_at.to_rfc3339(),
        }
    }
}

/// Ids of online users
#[derive(Debug, Serialize)]
pub struct OnlineUsersResponse {
    pub user_ids: Vec<i64>,
}

/// Online admins
#[derive(Debug, Serialize)]
pub struct OnlineAdminsResponse {
    pub admin_ids: Vec<i64>,
    pub any_online: bool,
}

/// Presence of one user
#[derive(Debug, Serialize)]
pub struct UserStatusResponse {
    pub user_id: i64,
    pub online: bool,
}

/// Presence change acknowledgement
#[derive(Debug, Serialize)]
pub struct PresenceResponse {
    pub user_id: i64,
    pub online: bool,
    /// Seconds until presence lapses without another heartbeat
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub updated: u64,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}
