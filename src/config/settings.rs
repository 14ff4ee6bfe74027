//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Presence and pub/sub backend (Redis)
    pub redis: RedisSettings,

    /// Chat presence, channel and notification tuning
    pub chat: ChatSettings,

    /// Outbound mail (SMTP)
    pub mail: MailSettings,

    /// JWT settings used to verify the upstream-issued access tokens
    pub jwt: JwtSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,
}

/// Redis configuration.
///
/// Presence keys and per-user chat channels both live on this instance.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    pub host: String,

    pub port: u16,

    #[serde(default)]
    pub password: Option<String>,
}

/// Chat tuning knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatSettings {
    /// Lifetime of a presence key without a heartbeat
    pub presence_ttl_secs: u64,

    /// Minimum spacing between two emails for the same sender/recipient pair
    pub notification_window_hours: i64,

    /// Prefix of the per-user pub/sub channel ("chat:user:" -> "chat:user:42")
    pub channel_prefix: String,

    /// Prefix of the presence keys ("chat:online:" -> "chat:online:42")
    pub presence_prefix: String,

    /// Maximum message body length in characters
    pub max_message_length: usize,
}

/// SMTP configuration for chat notification emails.
#[derive(Debug, Clone, Deserialize)]
pub struct MailSettings {
    pub host: String,

    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Sender address, e.g. "Rentals <no-reply@example.com>"
    pub from_address: String,

    /// Use STARTTLS; disable for local mail catchers
    pub starttls: bool,

    /// Link placed in notification emails
    pub portal_url: String,
}

/// JWT authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key shared with the token issuer
    pub secret: String,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// Minimum required length for JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if a value fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("redis.host", "localhost")?
            .set_default("redis.port", 6379)?
            .set_default("chat.presence_ttl_secs", 300)?
            .set_default("chat.notification_window_hours", 24)?
            .set_default("chat.channel_prefix", "chat:user:")?
            .set_default("chat.presence_prefix", "chat:online:")?
            .set_default("chat.max_message_length", 5000)?
            .set_default("mail.host", "localhost")?
            .set_default("mail.port", 587)?
            .set_default("mail.from_address", "no-reply@localhost")?
            .set_default("mail.starttls", true)?
            .set_default("mail.portal_url", "http://localhost:3000")?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SERVER__PORT=3000 -> server.port = 3000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.host", std::env::var("REDIS_HOST").ok())?
            .set_override_option("redis.port", std::env::var("REDIS_PORT").ok())?
            .set_override_option("redis.password", std::env::var("REDIS_PASSWORD").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option("mail.host", std::env::var("SMTP_HOST").ok())?
            .set_override_option("mail.port", std::env::var("SMTP_PORT").ok())?
            .set_override_option("mail.username", std::env::var("SMTP_USERNAME").ok())?
            .set_override_option("mail.password", std::env::var("SMTP_PASSWORD").ok())?
            .set_override_option("mail.from_address", std::env::var("MAIL_FROM").ok())?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| settings.validate().map(|()| settings))
    }

    /// Reject configurations the chat layer cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "JWT secret must be at least {} characters for security. Current length: {}",
                MIN_JWT_SECRET_LENGTH,
                self.jwt.secret.len()
            )));
        }
        if self.chat.presence_ttl_secs == 0 {
            return Err(ConfigError::Message(
                "chat.presence_ttl_secs must be greater than zero".into(),
            ));
        }
        if self.chat.notification_window_hours <= 0 {
            return Err(ConfigError::Message(
                "chat.notification_window_hours must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl RedisSettings {
    /// Build the `redis://` URL from host, port and optional password.
    ///
    /// The password is percent-encoded; redis decodes it again when parsing.
    pub fn connection_url(&self) -> String {
        match self.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => format!(
                "redis://:{}@{}:{}",
                utf8_percent_encode(password, NON_ALPHANUMERIC),
                self.host,
                self.port
            ),
            None => format!("redis://{}:{}", self.host, self.port),
        }
    }
}

impl ChatSettings {
    /// Notification window as a chrono duration.
    pub fn notification_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.notification_window_hours)
    }
}
