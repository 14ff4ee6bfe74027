//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use sqlx::PgPool;
use tokio::net::TcpListener;

use crate::application::services::{
    ChatNotificationService, ChatService, MessagingService, MessagingServiceImpl,
};
use crate::config::Settings;
use crate::infrastructure::mail::{MemoryMailer, SmtpMailer};
use crate::infrastructure::memory::{
    MemoryBroker, MemoryChatMessageRepository, MemoryConversationRepository,
    MemoryNotificationLedger, MemoryUserDirectory,
};
use crate::infrastructure::realtime::RedisBroker;
use crate::infrastructure::repositories::{
    PgChatMessageRepository, PgConversationRepository, PgNotificationLedger, PgUserDirectory,
};
use crate::infrastructure::database;
use crate::presentation::http::{handlers::health, routes};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub chat: Arc<ChatService>,
    pub messaging: Arc<dyn MessagingService>,
    /// `None` when running on the in-memory stores
    pub db: Option<PgPool>,
}

/// Process-local backends for running without PostgreSQL, Redis or SMTP.
///
/// Handles are kept so callers can seed users and inspect what was stored
/// or mailed.
#[derive(Clone, Default)]
pub struct InMemoryBackends {
    pub broker: Arc<MemoryBroker>,
    pub users: Arc<MemoryUserDirectory>,
    pub conversations: Arc<MemoryConversationRepository>,
    pub messages: Arc<MemoryChatMessageRepository>,
    pub ledger: Arc<MemoryNotificationLedger>,
    pub mailer: Arc<MemoryMailer>,
}

impl AppState {
    /// Wire the chat services on in-memory backends and connect the broker.
    pub async fn in_memory(settings: Settings, backends: &InMemoryBackends) -> Self {
        let chat = Arc::new(ChatService::with_backend(
            backends.broker.clone(),
            &settings.chat,
        ));
        chat.initialize().await;

        let notifications = Arc::new(ChatNotificationService::new(
            backends.ledger.clone(),
            backends.mailer.clone(),
            &settings.mail,
            settings.chat.notification_window(),
        ));

        let messaging = Arc::new(MessagingServiceImpl::new(
            backends.messages.clone(),
            backends.conversations.clone(),
            backends.users.clone(),
            chat.clone(),
            notifications,
            settings.chat.max_message_length,
        ));

        Self {
            settings: Arc::new(settings),
            chat,
            messaging,
            db: None,
        }
    }
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        // Create database pool
        let db = database::create_pool(&settings.database).await?;
        tracing::info!("Database connection pool created");
        database::run_migrations(&db).await?;

        // Realtime transport; an outage leaves chat running without live push
        let broker = Arc::new(RedisBroker::new(&settings.redis));
        let chat = Arc::new(ChatService::with_backend(broker, &settings.chat));
        if chat.initialize().await {
            tracing::info!("Redis connection established");
        }

        let mailer = Arc::new(SmtpMailer::new(&settings.mail)?);
        let notifications = Arc::new(ChatNotificationService::new(
            Arc::new(PgNotificationLedger::new(db.clone())),
            mailer,
            &settings.mail,
            settings.chat.notification_window(),
        ));

        let messaging = Arc::new(MessagingServiceImpl::new(
            Arc::new(PgChatMessageRepository::new(db.clone())),
            Arc::new(PgConversationRepository::new(db.clone())),
            Arc::new(PgUserDirectory::new(db.clone())),
            chat.clone(),
            notifications,
            settings.chat.max_message_length,
        ));

        // Create app state
        let state = AppState {
            settings: Arc::new(settings.clone()),
            chat,
            messaging,
            db: Some(db),
        };

        health::init_server_start();
        let router = routes::create_router(state);

        // Bind to address
        let listener = TcpListener::bind(settings.server_addr()).await?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self { listener, router })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
