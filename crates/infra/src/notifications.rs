//! Outbound notifications (e.g. "we ran out of stock" emails).

use std::sync::Mutex;

/// Delivers a human-readable message to a destination (an email address for
/// the stock team, typically).
pub trait NotificationSink: Send + Sync {
    fn send(&self, destination: &str, message: &str) -> anyhow::Result<()>;
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifications;

impl NotificationSink for LoggingNotifications {
    fn send(&self, destination: &str, message: &str) -> anyhow::Result<()> {
        tracing::info!(destination, message, "notification sent");
        Ok(())
    }
}

/// A notification captured by [`InMemoryNotifications`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub destination: String,
    pub message: String,
}

/// Records every notification; for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryNotifications {
    sent: Mutex<Vec<SentNotification>>,
}

impl InMemoryNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

impl NotificationSink for InMemoryNotifications {
    fn send(&self, destination: &str, message: &str) -> anyhow::Result<()> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| anyhow::anyhow!("notification log poisoned"))?;
        sent.push(SentNotification {
            destination: destination.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}
