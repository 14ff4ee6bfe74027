//! In-memory backends
//!
//! Process-local implementations of the realtime and repository traits.
//! Used by the test suite and for running the service without Redis or
//! PostgreSQL.

mod broker;
mod repositories;

pub use broker::MemoryBroker;
pub use repositories::{
    MemoryChatMessageRepository, MemoryConversationRepository, MemoryNotificationLedger,
    MemoryUserDirectory,
};
