//! Outbound notifications.
//!
//! Mail transport lives outside this crate; the core only needs something
//! that accepts a rendered message. [`LogNotifier`] is the default for
//! deployments without a mail relay: it records every message in the log.

use crate::config::MailSettings;
use crate::errors::Result;
use async_trait::async_trait;
use tracing::info;

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<()>;
}

/// Writes messages to the tracing log instead of delivering them.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    sender: MailSettings,
}

impl LogNotifier {
    #[must_use]
    pub const fn new(sender: MailSettings) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        info!(
            from = %format!("{} <{}>", self.sender.sender_name, self.sender.sender_address),
            to = %message.to,
            subject = %message.subject,
            "Notification queued for delivery"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_accepts_messages() -> Result<()> {
        let notifier = LogNotifier::new(MailSettings::default());
        notifier
            .send(&OutboundMessage {
                to: "owner@example.org".to_string(),
                subject: "Hello".to_string(),
                html: "<p>Hi</p>".to_string(),
            })
            .await
    }
}
