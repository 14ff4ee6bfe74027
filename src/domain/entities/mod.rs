//! # Domain Entities
//!
//! Core domain entities of the chat layer.
//!
//! ## Entities
//!
//! - **ChatEvent**: Transient real-time event published to a user channel
//! - **Conversation**: One row per unordered user pair, canonical `(min, max)`
//! - **ChatMessage**: Append-only message log
//! - **NotificationLedgerEntry**: Email rate-limit state per sender/recipient direction
//! - **UserContact**: Read-only view of portal users
//!
//! ## Repository Traits
//!
//! Data access contracts live next to each entity and are implemented in the
//! infrastructure layer (PostgreSQL and in-memory).

mod chat_event;
mod chat_message;
mod contact;
mod conversation;
mod notification;

pub use chat_event::{
    equipment_request_text, ChatEvent, EquipmentDetails, EquipmentRequestData, MessageKind,
    MessagePayload,
};
pub use chat_message::{ChatMessage, ChatMessageRepository, NewChatMessage};
pub use contact::{UserContact, UserDirectory};
pub use conversation::{Conversation, ConversationPair, ConversationRepository};
pub use notification::{NotificationLedger, NotificationLedgerEntry};

#[cfg(test)]
pub use chat_message::MockChatMessageRepository;
#[cfg(test)]
pub use contact::MockUserDirectory;
#[cfg(test)]
pub use conversation::MockConversationRepository;
#[cfg(test)]
pub use notification::MockNotificationLedger;
