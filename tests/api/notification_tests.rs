//! Chat notification rate-limit tests

use std::sync::Arc;

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;

use rental_chat::application::services::ChatNotificationService;
use rental_chat::domain::{NotificationLedgerEntry, UserRole};
use rental_chat::infrastructure::mail::MemoryMailer;
use rental_chat::infrastructure::memory::MemoryNotificationLedger;

use crate::common::{contact, test_settings, ADMIN_ID, CLIENT_ID};

struct Fixture {
    ledger: Arc<MemoryNotificationLedger>,
    mailer: Arc<MemoryMailer>,
    service: ChatNotificationService,
}

fn fixture() -> Fixture {
    let settings = test_settings();
    let ledger = Arc::new(MemoryNotificationLedger::new());
    let mailer = Arc::new(MemoryMailer::new());
    let service = ChatNotificationService::new(
        ledger.clone(),
        mailer.clone(),
        &settings.mail,
        settings.chat.notification_window(),
    );
    Fixture {
        ledger,
        mailer,
        service,
    }
}

fn sent_hours_ago(sender_id: i64, recipient_id: i64, hours: i64, count: i32) -> NotificationLedgerEntry {
    NotificationLedgerEntry {
        sender_id,
        recipient_id,
        last_sent_at: Utc::now() - Duration::hours(hours),
        notification_count: count,
    }
}

async fn notify(f: &Fixture, from: i64, to: i64) -> bool {
    let client = contact(CLIENT_ID, "Cara", UserRole::Client);
    let admin = contact(ADMIN_ID, "Adam", UserRole::Admin);
    let (sender, recipient) = if from == CLIENT_ID {
        (client, admin)
    } else {
        (admin, client)
    };
    f.service.send_chat_notification(from, to, &sender, &recipient).await
}

#[tokio::test]
async fn test_first_notification_creates_ledger_entry() {
    let f = fixture();
    assert!(f.service.can_send_chat_notification(CLIENT_ID, ADMIN_ID).await);

    assert!(notify(&f, CLIENT_ID, ADMIN_ID).await);

    let entry = f.ledger.get(CLIENT_ID, ADMIN_ID).unwrap();
    assert_eq!(entry.notification_count, 1);
    let sent = f.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "adam@rentals.test");
}

#[tokio::test]
async fn test_second_message_within_window_is_not_emailed() {
    let f = fixture();
    assert!(notify(&f, CLIENT_ID, ADMIN_ID).await);

    assert!(!f.service.can_send_chat_notification(CLIENT_ID, ADMIN_ID).await);
    assert!(!notify(&f, CLIENT_ID, ADMIN_ID).await);

    assert_eq!(f.mailer.sent().len(), 1);
    assert_eq!(f.ledger.get(CLIENT_ID, ADMIN_ID).unwrap().notification_count, 1);
}

#[tokio::test]
async fn test_window_not_yet_elapsed() {
    let f = fixture();
    f.ledger.insert(sent_hours_ago(CLIENT_ID, ADMIN_ID, 23, 3));

    assert!(!f.service.can_send_chat_notification(CLIENT_ID, ADMIN_ID).await);
    assert!(!notify(&f, CLIENT_ID, ADMIN_ID).await);
    assert!(f.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_window_elapsed_increments_count() {
    let f = fixture();
    let previous = sent_hours_ago(CLIENT_ID, ADMIN_ID, 25, 3);
    f.ledger.insert(previous.clone());

    assert!(f.service.can_send_chat_notification(CLIENT_ID, ADMIN_ID).await);
    assert!(notify(&f, CLIENT_ID, ADMIN_ID).await);

    let entry = f.ledger.get(CLIENT_ID, ADMIN_ID).unwrap();
    assert_eq!(entry.notification_count, 4);
    assert!(entry.last_sent_at > previous.last_sent_at);
}

#[tokio::test]
async fn test_directions_are_independent() {
    let f = fixture();
    assert!(notify(&f, CLIENT_ID, ADMIN_ID).await);

    // The admin's reply has its own window
    assert!(f.service.can_send_chat_notification(ADMIN_ID, CLIENT_ID).await);
    assert!(notify(&f, ADMIN_ID, CLIENT_ID).await);

    assert_eq!(f.mailer.sent().len(), 2);
    assert_eq!(f.ledger.get(ADMIN_ID, CLIENT_ID).unwrap().notification_count, 1);
}

#[tokio::test]
async fn test_failed_mail_still_consumes_window() {
    let settings = test_settings();
    let ledger = Arc::new(MemoryNotificationLedger::new());
    let service = ChatNotificationService::new(
        ledger.clone(),
        Arc::new(MemoryMailer::failing()),
        &settings.mail,
        settings.chat.notification_window(),
    );
    let sender = contact(CLIENT_ID, "Cara", UserRole::Client);
    let recipient = contact(ADMIN_ID, "Adam", UserRole::Admin);

    // Attempted: the window is spent even though the relay refused the mail
    assert!(service.send_chat_notification(CLIENT_ID, ADMIN_ID, &sender, &recipient).await);

    assert_eq!(ledger.get(CLIENT_ID, ADMIN_ID).unwrap().notification_count, 1);
    assert!(!service.can_send_chat_notification(CLIENT_ID, ADMIN_ID).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sends_produce_one_email() {
    let f = Arc::new(fixture());

    let first = {
        let f = f.clone();
        tokio::spawn(async move { notify(&f, CLIENT_ID, ADMIN_ID).await })
    };
    let second = {
        let f = f.clone();
        tokio::spawn(async move { notify(&f, CLIENT_ID, ADMIN_ID).await })
    };
    let (first, second) = tokio::join!(first, second);

    let wins = [first.unwrap(), second.unwrap()].iter().filter(|won| **won).count();
    assert_eq!(wins, 1);
    assert_eq!(f.mailer.sent().len(), 1);
    assert_eq!(f.ledger.get(CLIENT_ID, ADMIN_ID).unwrap().notification_count, 1);
}
