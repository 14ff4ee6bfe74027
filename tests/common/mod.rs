//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure.

use axum::{
    body::{to_bytes, Body},
    http::Request,
    response::Response,
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use tower::ServiceExt;

use rental_chat::config::{
    ChatSettings, CorsSettings, DatabaseSettings, JwtSettings, MailSettings, RedisSettings,
    ServerSettings, Settings,
};
use rental_chat::domain::{UserContact, UserRole};
use rental_chat::presentation::http::create_router;
use rental_chat::presentation::middleware::Claims;
use rental_chat::startup::{AppState, InMemoryBackends};

pub const TEST_JWT_SECRET: &str = "integration-test-secret-at-least-32-chars";

pub const CLIENT_ID: i64 = 42;
pub const ADMIN_ID: i64 = 2;

/// Settings for the in-memory stack
pub fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        database: DatabaseSettings {
            url: "postgres://unused".into(),
            max_connections: 1,
            min_connections: 0,
            acquire_timeout: 1,
        },
        redis: RedisSettings {
            host: "localhost".into(),
            port: 6379,
            password: None,
        },
        chat: ChatSettings {
            presence_ttl_secs: 300,
            notification_window_hours: 24,
            channel_prefix: "chat:user:".into(),
            presence_prefix: "chat:online:".into(),
            max_message_length: 5000,
        },
        mail: MailSettings {
            host: "localhost".into(),
            port: 1025,
            username: None,
            password: None,
            from_address: "Rentals <no-reply@rentals.test>".into(),
            starttls: false,
            portal_url: "https://rentals.test".into(),
        },
        jwt: JwtSettings {
            secret: TEST_JWT_SECRET.into(),
        },
        cors: CorsSettings {
            allowed_origins: vec!["*".into()],
        },
        environment: "test".into(),
    }
}

pub fn contact(id: i64, first_name: &str, role: UserRole) -> UserContact {
    UserContact {
        id,
        first_name: Some(first_name.into()),
        last_name: None,
        email: format!("{}@rentals.test", first_name.to_lowercase()),
        role,
    }
}

/// Sign an access token the way the upstream auth service does
pub fn token_for(user_id: i64, role: UserRole) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        role: Some(role.as_str().into()),
        exp: now + 3600,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Test application builder
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub backends: InMemoryBackends,
}

impl TestApp {
    /// In-memory app seeded with client 42 ("Cara") and admin 2 ("Adam")
    pub async fn new() -> Self {
        let backends = InMemoryBackends::default();
        backends.users.insert(contact(CLIENT_ID, "Cara", UserRole::Client));
        backends.users.insert(contact(ADMIN_ID, "Adam", UserRole::Admin));
        Self::with_backends(backends).await
    }

    pub async fn with_backends(backends: InMemoryBackends) -> Self {
        let state = AppState::in_memory(test_settings(), &backends).await;
        let router = create_router(state.clone());
        Self {
            router,
            state,
            backends,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Make a GET request to the application
    pub async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Make an authenticated GET request
    pub async fn get_auth(&self, uri: &str, token: &str) -> Response {
        self.send(
            Request::builder()
                .method("GET")
                .uri(uri)
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Make an authenticated POST request without a body
    pub async fn post_auth(&self, uri: &str, token: &str) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// Make an authenticated POST request with JSON body
    pub async fn post_json_auth(&self, uri: &str, body: &Value, token: &str) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}
