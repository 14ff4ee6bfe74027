//! # Domain Layer
//!
//! Entities, value objects and data-access contracts of the chat layer.
//! It is independent of any external frameworks or infrastructure concerns.
//!
//! ## Structure
//!
//! - **entities**: Chat events, conversations, messages, notification ledger, contacts
//! - **value_objects**: Immutable value types (UserRole)
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Repository traits define data access contracts
//! - Entities encapsulate domain behavior (canonical pairs, window checks)

pub mod entities;
pub mod value_objects;

// Re-export commonly used types
pub use entities::*;
pub use value_objects::*;
