//! Upload notifications.
//!
//! [`SmtpNotifier`] delivers a plain-text email through an SMTP relay.
//! [`LogNotifier`] stands in when no relay is configured and only records the
//! message in the log.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
};
use std::fmt;
use thiserror::Error;
use tracing::info;

pub const UPLOAD_SUBJECT: &str = "File successfully uploaded";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// What a completed upload notification says.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadNotice {
    /// Stored object key.
    pub key: String,
    /// Stored size in bytes.
    pub size: i64,
}

impl UploadNotice {
    pub fn subject(&self) -> &'static str {
        UPLOAD_SUBJECT
    }

    pub fn body(&self) -> String {
        format!("File {} - {}B successfully uploaded to s3.", self.key, self.size)
    }
}

#[async_trait]
pub trait Notifier: Send + Sync + fmt::Debug + 'static {
    /// Deliver the notice. Returns once the relay has accepted the message.
    async fn notify(&self, notice: &UploadNotice) -> Result<(), NotifyError>;
}

/// Sends notices as email over SMTP.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpNotifier {
    /// Build a notifier for a plaintext relay at `host:port`.
    ///
    /// The transport keeps its own connection pool and is shared by every
    /// request.
    pub fn new(host: &str, port: u16, from: &str, to: &str) -> Result<Self, NotifyError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(port)
            .build();
        Ok(Self {
            transport,
            from: from.parse()?,
            to: to.parse()?,
        })
    }

    fn message(&self, notice: &UploadNotice) -> Result<Message, NotifyError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(notice.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(notice.body())?;
        Ok(message)
    }
}

impl fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("from", &self.from.to_string())
            .field("to", &self.to.to_string())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, notice: &UploadNotice) -> Result<(), NotifyError> {
        let message = self.message(notice)?;
        self.transport.send(message).await?;
        info!(key = %notice.key, to = %self.to, "sent upload notification");
        Ok(())
    }
}

/// Logs notices instead of sending them.
#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &UploadNotice) -> Result<(), NotifyError> {
        info!(
            subject = notice.subject(),
            body = %notice.body(),
            "smtp not configured; notification logged only"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_text_matches_upload() {
        let notice = UploadNotice {
            key: "1700000000000_a.txt".into(),
            size: 10,
        };
        assert_eq!(notice.subject(), "File successfully uploaded");
        assert_eq!(
            notice.body(),
            "File 1700000000000_a.txt - 10B successfully uploaded to s3."
        );
    }

    #[tokio::test]
    async fn smtp_message_carries_addresses_and_body() {
        let notifier =
            SmtpNotifier::new("localhost", 2525, "uploads@filedrop.local", "ops@example.com")
                .unwrap();
        let notice = UploadNotice {
            key: "k".into(),
            size: 3,
        };
        let raw = String::from_utf8(notifier.message(&notice).unwrap().formatted()).unwrap();
        assert!(raw.contains("From: uploads@filedrop.local"));
        assert!(raw.contains("To: ops@example.com"));
        assert!(raw.contains("Subject: File successfully uploaded"));
        assert!(raw.contains("File k - 3B successfully uploaded to s3."));
    }

    #[tokio::test]
    async fn rejects_malformed_addresses() {
        assert!(matches!(
            SmtpNotifier::new("localhost", 25, "not an address", "ops@example.com"),
            Err(NotifyError::Address(_))
        ));
    }
}
