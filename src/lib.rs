//! # Rental Chat Library
//!
//! Real-time chat and presence for the equipment-rental portal:
//! - TTL-based online presence on Redis
//! - Per-user pub/sub channels for live message delivery
//! - Persistent conversations and message history in PostgreSQL
//! - Rate-limited email notifications for new chat messages
//! - RESTful HTTP API and a WebSocket relay
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Chat entities, roles and repository traits
//! - **Application Layer**: Chat, messaging and notification services plus DTOs
//! - **Infrastructure Layer**: PostgreSQL, Redis, SMTP and in-memory backends
//! - **Presentation Layer**: HTTP handlers and WebSocket relay
//!
//! ## Module Structure
//!
//! ```text
//! rental_chat/
//! +-- config/         Configuration management
//! +-- domain/         Domain entities, value objects, and traits
//! +-- application/    Application services and DTOs
//! +-- infrastructure/ Database, realtime, mail and metrics
//! +-- presentation/   HTTP routes and WebSocket relay
//! +-- shared/         Common utilities (errors, validation)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
