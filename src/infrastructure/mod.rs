//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Database repositories (PostgreSQL)
//! - Presence and pub/sub transport (Redis)
//! - SMTP mail delivery
//! - Prometheus metrics
//! - In-memory backends for tests and local runs

pub mod database;
pub mod mail;
pub mod memory;
pub mod metrics;
pub mod realtime;
pub mod repositories;
