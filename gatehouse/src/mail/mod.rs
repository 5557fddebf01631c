//! Outbound mail.
//!
//! Delivery is best effort: callers log a [`MailError`] and carry on, so a
//! broken mail relay never rolls back the state change that triggered it.

pub mod smtp;
pub mod templates;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

pub use smtp::{SmtpConfig, SmtpMailer};

/// A message ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Mail delivery errors
#[derive(Debug, Error)]
pub enum MailError {
    /// Sender or recipient is not a valid mailbox
    #[error("Invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// Message could not be assembled
    #[error("Failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    /// Relay rejected or was unreachable
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Outbound mail sender
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// Logs messages instead of delivering them. Used when SMTP is not configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        log::info!(
            "SMTP not configured, dropping mail to {} ({}): {}",
            mail.to,
            mail.subject,
            mail.text
        );
        Ok(())
    }
}

/// Keeps every message in memory
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages sent so far, oldest first
    pub async fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().await.clone()
    }

    /// Most recent message addressed to `to`
    pub async fn last_to(&self, to: &str) -> Option<OutgoingMail> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find(|mail| mail.to == to)
            .cloned()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        self.sent.lock().await.push(mail);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail(to: &str, subject: &str) -> OutgoingMail {
        OutgoingMail {
            to: to.to_string(),
            subject: subject.to_string(),
            text: "text".to_string(),
            html: "<p>html</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_recording_mailer_keeps_order() {
        let mailer = RecordingMailer::new();
        mailer.send(mail("a@x.com", "first")).await.unwrap();
        mailer.send(mail("b@x.com", "second")).await.unwrap();
        mailer.send(mail("a@x.com", "third")).await.unwrap();

        assert_eq!(mailer.sent().await.len(), 3);
        assert_eq!(mailer.last_to("a@x.com").await.unwrap().subject, "third");
        assert!(mailer.last_to("c@x.com").await.is_none());
    }

    #[tokio::test]
    async fn test_log_mailer_never_fails() {
        assert!(LogMailer.send(mail("a@x.com", "hi")).await.is_ok());
    }
}
