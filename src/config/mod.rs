//! # Configuration Module
//!
//! This module handles application configuration loading and management.
//! Configuration can be loaded from:
//! - Environment variables (prefixed with APP__, plus REDIS_HOST / REDIS_PORT /
//!   REDIS_PASSWORD, DATABASE_URL, JWT_SECRET and SMTP_* shortcuts)
//! - Configuration files (config/default.toml, config/{environment}.toml)
//! - .env files (via dotenvy)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rental_chat::config::Settings;
//!
//! let settings = Settings::load()?;
//! println!("Presence backend at {}", settings.redis.connection_url());
//! ```

mod settings;

pub use settings::*;
