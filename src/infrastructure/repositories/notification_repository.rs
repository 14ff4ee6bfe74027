//! Notification Ledger Implementation
//!
//! PostgreSQL implementation of the NotificationLedger trait.
//!
//! `claim` is a single conditional upsert: the row is inserted when absent and
//! only updated when its `last_sent_at` is outside the window. Postgres
//! serializes concurrent upserts on the `(sender_id, recipient_id)` unique
//! index, so exactly one of two racing callers gets a row back.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::domain::{NotificationLedger, NotificationLedgerEntry};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct LedgerRow {
    sender_id: i64,
    recipient_id: i64,
    last_sent_at: DateTime<Utc>,
    notification_count: i32,
}

impl From<LedgerRow> for NotificationLedgerEntry {
    fn from(row: LedgerRow) -> Self {
        NotificationLedgerEntry {
            sender_id: row.sender_id,
            recipient_id: row.recipient_id,
            last_sent_at: row.last_sent_at,
            notification_count: row.notification_count,
        }
    }
}

/// PostgreSQL notification ledger.
#[derive(Clone)]
pub struct PgNotificationLedger {
    pool: PgPool,
}

impl PgNotificationLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationLedger for PgNotificationLedger {
    async fn find(
        &self,
        sender_id: i64,
        recipient_id: i64,
    ) -> Result<Option<NotificationLedgerEntry>, AppError> {
        let row = sqlx::query_as::<_, LedgerRow>(
            r#"
            SELECT sender_id, recipient_id, last_sent_at, notification_count
            FROM chat_notifications
            WHERE sender_id = $1 AND recipient_id = $2
            "#,
        )
        .bind(sender_id)
        .bind(recipient_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn claim(
        &self,
        sender_id: i64,
        recipient_id: i64,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Option<i32>, AppError> {
        let claimed: Option<(i32,)> = sqlx::query_as(
            r#"
            INSERT INTO chat_notifications (sender_id, recipient_id, last_sent_at, notification_count)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (sender_id, recipient_id) DO UPDATE
            SET last_sent_at = EXCLUDED.last_sent_at,
                notification_count = chat_notifications.notification_count + 1
            WHERE chat_notifications.last_sent_at <= $4
            RETURNING notification_count
            "#,
        )
        .bind(sender_id)
        .bind(recipient_id)
        .bind(now)
        .bind(now - window)
        .fetch_optional(&self.pool)
        .await?;

        Ok(claimed.map(|(count,)| count))
    }
}
