//! Chat Notification Service
//!
//! Emails a recipient about new chat messages, at most once per window for
//! each sender/recipient direction.
//!
//! Every failure to read or claim the ledger denies the notification, so a
//! broken ledger can never turn into an email storm.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};
use tracing::{debug, info, warn};

use crate::config::MailSettings;
use crate::domain::{NotificationLedger, UserContact};
use crate::infrastructure::mail::{Mailer, OutgoingEmail};
use crate::infrastructure::metrics;

/// Rate-limited email escalation for chat messages.
#[derive(Clone)]
pub struct ChatNotificationService {
    ledger: Arc<dyn NotificationLedger>,
    mailer: Arc<dyn Mailer>,
    from_address: String,
    portal_url: String,
    window: Duration,
}

impl ChatNotificationService {
    pub fn new(
        ledger: Arc<dyn NotificationLedger>,
        mailer: Arc<dyn Mailer>,
        mail: &MailSettings,
        window: Duration,
    ) -> Self {
        Self {
            ledger,
            mailer,
            from_address: mail.from_address.clone(),
            portal_url: mail.portal_url.clone(),
            window,
        }
    }

    /// Whether `from_user_id` may trigger an email to `to_user_id` now.
    pub async fn can_send_chat_notification(&self, from_user_id: i64, to_user_id: i64) -> bool {
        self.can_send_at(from_user_id, to_user_id, Utc::now()).await
    }

    async fn can_send_at(&self, from_user_id: i64, to_user_id: i64, now: DateTime<Utc>) -> bool {
        match self.ledger.find(from_user_id, to_user_id).await {
            Ok(None) => true,
            Ok(Some(entry)) => entry.is_due(now, self.window),
            Err(e) => {
                warn!(
                    from_user_id = from_user_id,
                    to_user_id = to_user_id,
                    error = %e,
                    "Notification ledger lookup failed; suppressing email"
                );
                false
            }
        }
    }

    /// Email the recipient if the window for this direction is open.
    ///
    /// The ledger slot is claimed atomically before the mail goes out, so two
    /// concurrent sends for the same direction produce one email.
    ///
    /// Returns whether the window was claimed and a send attempted. A mail
    /// the relay rejects still counts: the window is consumed either way and
    /// the failure is logged and counted in metrics.
    pub async fn send_chat_notification(
        &self,
        from_user_id: i64,
        to_user_id: i64,
        sender: &UserContact,
        recipient: &UserContact,
    ) -> bool {
        let now = Utc::now();

        if !self.can_send_at(from_user_id, to_user_id, now).await {
            debug!(from_user_id = from_user_id, to_user_id = to_user_id, "Notification window closed");
            metrics::record_notification("suppressed");
            return false;
        }

        if recipient.email.trim().is_empty() {
            debug!(to_user_id = to_user_id, "Recipient has no email address");
            metrics::record_notification("suppressed");
            return false;
        }

        match self.ledger.claim(from_user_id, to_user_id, now, self.window).await {
            Ok(Some(count)) => {
                debug!(from_user_id = from_user_id, to_user_id = to_user_id, count = count, "Notification slot claimed");
            }
            Ok(None) => {
                debug!(from_user_id = from_user_id, to_user_id = to_user_id, "Notification slot taken concurrently");
                metrics::record_notification("suppressed");
                return false;
            }
            Err(e) => {
                warn!(
                    from_user_id = from_user_id,
                    to_user_id = to_user_id,
                    error = %e,
                    "Notification ledger update failed; suppressing email"
                );
                metrics::record_notification("suppressed");
                return false;
            }
        }

        let email = self.render(sender, recipient, now);
        match self.mailer.send(email).await {
            Ok(()) => {
                info!(from_user_id = from_user_id, to_user_id = to_user_id, "Chat notification sent");
                metrics::record_notification("sent");
                true
            }
            Err(e) => {
                warn!(
                    from_user_id = from_user_id,
                    to_user_id = to_user_id,
                    error = %e,
                    "Chat notification email failed"
                );
                metrics::record_notification("failed");
                true
            }
        }
    }

    fn render(&self, sender: &UserContact, recipient: &UserContact, at: DateTime<Utc>) -> OutgoingEmail {
        let sender_name = sender.display_name();
        let greeting = recipient.greeting_name();
        let html_body = format!(
            concat!(
                "<p>Hi {recipient},</p>",
                "<p>You have a new message from <strong>{sender}</strong> ",
                "sent on {sent_at}.</p>",
                "<p><a href=\"{portal}\">Open your messages</a> to reply.</p>",
            ),
            recipient = encode_text(&greeting),
            sender = encode_text(&sender_name),
            sent_at = at.format("%Y-%m-%d %H:%M UTC"),
            portal = encode_double_quoted_attribute(&self.portal_url),
        );

        OutgoingEmail {
            from: self.from_address.clone(),
            to: recipient.email.clone(),
            subject: format!("New message from {}", sender_name),
            html_body,
        }
    }
}

impl std::fmt::Debug for ChatNotificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatNotificationService")
            .field("from_address", &self.from_address)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}
