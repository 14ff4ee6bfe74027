//! Messaging Service
//!
//! The send pipeline behind the chat routes, plus conversation and history
//! reads.
//!
//! A send always runs in this order: persist the message, upsert the
//! conversation, publish the real-time event, attempt the email. Only the two
//! persistence steps can fail the request; publish and email outcomes are
//! reported back as flags.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use super::{ChatNotificationService, ChatService};
use crate::domain::{
    equipment_request_text, ChatMessage, ChatMessageRepository, Conversation, ConversationPair,
    ConversationRepository, EquipmentRequestData, MessageKind, MessagePayload, NewChatMessage,
    UserContact, UserDirectory,
};
use crate::shared::error::AppError;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 100;

/// Messaging service trait
#[async_trait]
pub trait MessagingService: Send + Sync {
    /// Send a direct message
    async fn send_message(&self, sender_id: i64, command: SendMessageCommand) -> Result<SendOutcome, MessagingError>;

    /// Send an equipment request from a client to an admin
    async fn send_equipment_request(
        &self,
        client_id: i64,
        command: EquipmentRequestCommand,
    ) -> Result<SendOutcome, MessagingError>;

    /// Conversations of a user, most recent first
    async fn list_conversations(&self, user_id: i64) -> Result<Vec<Conversation>, MessagingError>;

    /// Messages between a user and another participant, newest first
    async fn history(
        &self,
        user_id: i64,
        other_user_id: i64,
        query: HistoryQuery,
    ) -> Result<Vec<ChatMessage>, MessagingError>;

    /// Mark everything `other_user_id` sent to `user_id` as read
    async fn mark_read(&self, user_id: i64, other_user_id: i64) -> Result<u64, MessagingError>;

    async fn unread_count(&self, user_id: i64) -> Result<i64, MessagingError>;

    /// Admin accounts currently online
    async fn online_admins(&self) -> Result<Vec<i64>, MessagingError>;
}

/// Direct message request
#[derive(Debug, Clone)]
pub struct SendMessageCommand {
    pub to_user_id: i64,
    pub message: String,
    pub message_type: Option<MessageKind>,
    pub equipment_id: Option<i64>,
    pub equipment_name: Option<String>,
}

/// Equipment request
#[derive(Debug, Clone)]
pub struct EquipmentRequestCommand {
    pub admin_id: i64,
    pub equipment: EquipmentRequestData,
}

/// History paging
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryQuery {
    pub before: Option<i64>,
    pub limit: Option<i64>,
}

/// Result of a send.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub message: ChatMessage,
    pub conversation_id: i64,
    /// The event reached the transport
    pub delivered: bool,
    /// An email notification went out
    pub notified: bool,
}

/// Messaging service errors
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("Message too long (max {0} characters)")]
    MessageTooLong(usize),

    #[error("Cannot send a message to yourself")]
    SelfMessage,

    #[error("Recipient not found")]
    RecipientNotFound,

    #[error("Recipient is not an admin")]
    NotAnAdmin,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<MessagingError> for AppError {
    fn from(err: MessagingError) -> Self {
        match err {
            MessagingError::EmptyMessage | MessagingError::MessageTooLong(_) => {
                AppError::Validation(err.to_string())
            }
            MessagingError::SelfMessage | MessagingError::NotAnAdmin => {
                AppError::BadRequest(err.to_string())
            }
            MessagingError::RecipientNotFound => AppError::NotFound(err.to_string()),
            MessagingError::Repository(e) => e,
        }
    }
}

/// MessagingService implementation
pub struct MessagingServiceImpl {
    messages: Arc<dyn ChatMessageRepository>,
    conversations: Arc<dyn ConversationRepository>,
    users: Arc<dyn UserDirectory>,
    chat: Arc<ChatService>,
    notifications: Arc<ChatNotificationService>,
    max_message_length: usize,
}

impl MessagingServiceImpl {
    pub fn new(
        messages: Arc<dyn ChatMessageRepository>,
        conversations: Arc<dyn ConversationRepository>,
        users: Arc<dyn UserDirectory>,
        chat: Arc<ChatService>,
        notifications: Arc<ChatNotificationService>,
        max_message_length: usize,
    ) -> Self {
        Self {
            messages,
            conversations,
            users,
            chat,
            notifications,
            max_message_length,
        }
    }

    fn validate_body(&self, body: &str) -> Result<(), MessagingError> {
        if body.trim().is_empty() {
            return Err(MessagingError::EmptyMessage);
        }
        if body.chars().count() > self.max_message_length {
            return Err(MessagingError::MessageTooLong(self.max_message_length));
        }
        Ok(())
    }

    async fn recipient(&self, user_id: i64) -> Result<UserContact, MessagingError> {
        self.users
            .find_contact(user_id)
            .await?
            .ok_or(MessagingError::RecipientNotFound)
    }

    /// Persist the row and refresh the conversation preview.
    async fn store(&self, pair: ConversationPair, message: NewChatMessage) -> Result<(ChatMessage, Conversation), MessagingError> {
        let message = self.messages.create(message).await?;
        let conversation = self
            .conversations
            .upsert_last_message(pair, message.id, message.message.clone(), message.created_at)
            .await?;
        Ok((message, conversation))
    }

    /// Email the recipient if the window allows. Never fails the send.
    async fn notify(&self, sender_id: i64, recipient: &UserContact) -> bool {
        let sender = match self.users.find_contact(sender_id).await {
            Ok(Some(sender)) => sender,
            Ok(None) => {
                debug!(sender_id = sender_id, "Sender not in directory; skipping notification");
                return false;
            }
            Err(e) => {
                warn!(sender_id = sender_id, error = %e, "Sender lookup failed; skipping notification");
                return false;
            }
        };

        self.notifications
            .send_chat_notification(sender_id, recipient.id, &sender, recipient)
            .await
    }
}

#[async_trait]
impl MessagingService for MessagingServiceImpl {
    #[instrument(skip(self, command), fields(to_user_id = command.to_user_id))]
    async fn send_message(&self, sender_id: i64, command: SendMessageCommand) -> Result<SendOutcome, MessagingError> {
        self.validate_body(&command.message)?;
        if command.to_user_id == sender_id {
            return Err(MessagingError::SelfMessage);
        }
        let pair = ConversationPair::new(sender_id, command.to_user_id)?;
        let recipient = self.recipient(command.to_user_id).await?;

        let (message, conversation) = self
            .store(
                pair,
                NewChatMessage {
                    sender_id,
                    receiver_id: recipient.id,
                    message: command.message,
                    message_type: command.message_type.unwrap_or_default(),
                    equipment_id: command.equipment_id,
                    equipment_name: command.equipment_name,
                },
            )
            .await?;

        let delivered = self
            .chat
            .send_message(
                sender_id,
                recipient.id,
                MessagePayload {
                    id: message.id,
                    message: message.message.clone(),
                    message_type: Some(message.message_type),
                    equipment_id: message.equipment_id,
                    equipment_name: message.equipment_name.clone(),
                },
            )
            .await
            .is_ok();

        let notified = self.notify(sender_id, &recipient).await;

        Ok(SendOutcome {
            message,
            conversation_id: conversation.id,
            delivered,
            notified,
        })
    }

    #[instrument(skip(self, command), fields(admin_id = command.admin_id))]
    async fn send_equipment_request(
        &self,
        client_id: i64,
        command: EquipmentRequestCommand,
    ) -> Result<SendOutcome, MessagingError> {
        if command.admin_id == client_id {
            return Err(MessagingError::SelfMessage);
        }
        let pair = ConversationPair::new(client_id, command.admin_id)?;
        let admin = self.recipient(command.admin_id).await?;
        if !admin.role.is_admin() {
            return Err(MessagingError::NotAnAdmin);
        }

        let equipment = command.equipment;
        let body = equipment_request_text(&equipment.equipment_name);
        self.validate_body(&body)?;

        let (message, conversation) = self
            .store(
                pair,
                NewChatMessage {
                    sender_id: client_id,
                    receiver_id: admin.id,
                    message: body,
                    message_type: MessageKind::EquipmentRequest,
                    equipment_id: Some(equipment.equipment_id),
                    equipment_name: Some(equipment.equipment_name.clone()),
                },
            )
            .await?;

        let delivered = self
            .chat
            .send_equipment_request(client_id, admin.id, &equipment, message.id)
            .await
            .is_ok();

        let notified = self.notify(client_id, &admin).await;

        Ok(SendOutcome {
            message,
            conversation_id: conversation.id,
            delivered,
            notified,
        })
    }

    async fn list_conversations(&self, user_id: i64) -> Result<Vec<Conversation>, MessagingError> {
        Ok(self
            .conversations
            .list_for_user(user_id, MAX_PAGE_SIZE)
            .await?)
    }

    async fn history(
        &self,
        user_id: i64,
        other_user_id: i64,
        query: HistoryQuery,
    ) -> Result<Vec<ChatMessage>, MessagingError> {
        let pair = ConversationPair::new(user_id, other_user_id)?;
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        Ok(self.messages.list_between(pair, query.before, limit).await?)
    }

    async fn mark_read(&self, user_id: i64, other_user_id: i64) -> Result<u64, MessagingError> {
        ConversationPair::new(user_id, other_user_id)?;
        Ok(self.messages.mark_read(user_id, other_user_id).await?)
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64, MessagingError> {
        Ok(self.messages.count_unread(user_id).await?)
    }

    async fn online_admins(&self) -> Result<Vec<i64>, MessagingError> {
        let online = self.chat.get_online_users().await;
        if online.is_empty() {
            return Ok(online);
        }
        let admins = self.users.admin_ids().await?;
        Ok(online
            .into_iter()
            .filter(|id| admins.contains(id))
            .collect())
    }
}
