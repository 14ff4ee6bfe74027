//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **ChatService**: Presence and real-time event delivery
//! - **ChatNotificationService**: Rate-limited email escalation
//! - **MessagingService**: Send pipeline, conversations and history

pub mod chat_service;
pub mod messaging_service;
pub mod notification_service;

pub use chat_service::ChatService;
pub use messaging_service::{
    EquipmentRequestCommand, HistoryQuery, MessagingError, MessagingService,
    MessagingServiceImpl, SendMessageCommand, SendOutcome,
};
pub use notification_service::ChatNotificationService;
