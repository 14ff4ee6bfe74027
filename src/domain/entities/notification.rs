//! Notification ledger entry and trait.
//!
//! One row per directional (sender, recipient) pair in `chat_notifications`,
//! holding the time of the last email and how many were sent.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Rate-limit state for one sender -> recipient direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationLedgerEntry {
    pub sender_id: i64,
    pub recipient_id: i64,
    pub last_sent_at: DateTime<Utc>,
    pub notification_count: i32,
}

impl NotificationLedgerEntry {
    /// Whether another notification is allowed at `now`.
    pub fn is_due(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.last_sent_at >= window
    }
}

/// Persistence for the notification ledger.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationLedger: Send + Sync {
    /// Look up the entry for the exact (sender, recipient) direction.
    async fn find(
        &self,
        sender_id: i64,
        recipient_id: i64,
    ) -> Result<Option<NotificationLedgerEntry>, AppError>;

    /// Atomically take the notification slot for a direction.
    ///
    /// Inserts the entry with a count of 1 when absent. When present and
    /// `last_sent_at <= now - window`, refreshes the timestamp and increments
    /// the count. Returns the new count, or `None` when the window is still
    /// closed and nothing was written.
    async fn claim(
        &self,
        sender_id: i64,
        recipient_id: i64,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Option<i32>, AppError>;
}
