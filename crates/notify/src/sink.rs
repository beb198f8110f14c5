//! Notification request type and sinks.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use famledger_core::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    InviteReceived,
    InviteAccepted,
    LowBalance,
    LargeTransaction,
    AutoChargeRequested,
    CardSuspended,
}

/// A single outbound notification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    /// Id of the account/card/membership the notification refers to.
    pub related_entity: Option<String>,
}

/// Fire-and-forget delivery seam.
///
/// - Best-effort: sinks swallow or record their own failures
/// - At-least-once acceptable (recipients must tolerate duplicates)
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: Notification);
}

/// Production default until a real delivery collaborator is wired in:
/// structured log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&self, notification: Notification) {
        tracing::info!(
            recipient = %notification.recipient_id,
            kind = ?notification.kind,
            title = %notification.title,
            related = ?notification.related_entity,
            "notification requested"
        );
    }
}

/// In-memory sink for tests.
#[derive(Debug, Default)]
pub struct InMemorySink {
    sent: Mutex<Vec<Notification>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything delivered so far.
    pub fn sent(&self) -> Vec<Notification> {
        match self.sent.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Drain delivered notifications.
    pub fn take(&self) -> Vec<Notification> {
        match self.sent.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl NotificationSink for InMemorySink {
    fn deliver(&self, notification: Notification) {
        if let Ok(mut guard) = self.sent.lock() {
            guard.push(notification);
        }
    }
}
