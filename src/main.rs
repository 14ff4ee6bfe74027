//! # Rental Chat
//!
//! Chat and presence service for the equipment-rental portal.
//!
//! This is the application entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - Database connection pool
//! - Redis presence and pub/sub transport
//! - HTTP/WebSocket server

use anyhow::Result;
use tracing::info;

use rental_chat::config::Settings;
use rental_chat::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for structured logging
    rental_chat::telemetry::init_tracing();

    info!("Starting rental chat service...");

    // Load configuration from environment and config files
    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        "Configuration loaded"
    );

    // Build and run the application
    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
