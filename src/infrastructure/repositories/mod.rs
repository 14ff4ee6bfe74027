//! Repository Implementations
//!
//! PostgreSQL implementations of domain repository traits.
//!
//! ## Available Repositories
//!
//! - **PgConversationRepository** - One row per user pair, upserted on every message
//! - **PgChatMessageRepository** - Append-only message log with cursor pagination
//! - **PgNotificationLedger** - Email rate-limit ledger with atomic claim
//! - **PgUserDirectory** - Read-only view of the portal `users` table
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use sqlx::PgPool;
//! use rental_chat::infrastructure::repositories::{
//!     PgChatMessageRepository, PgConversationRepository, PgNotificationLedger,
//! };
//!
//! async fn setup_repositories(pool: PgPool) {
//!     let conversations = PgConversationRepository::new(pool.clone());
//!     let messages = PgChatMessageRepository::new(pool.clone());
//!     let ledger = PgNotificationLedger::new(pool);
//! }
//! ```

pub mod chat_message_repository;
pub mod conversation_repository;
pub mod notification_repository;
pub mod user_directory;

pub use chat_message_repository::PgChatMessageRepository;
pub use conversation_repository::PgConversationRepository;
pub use notification_repository::PgNotificationLedger;
pub use user_directory::PgUserDirectory;
