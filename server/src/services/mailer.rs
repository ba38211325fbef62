//! Outbound email
//!
//! Services talk to the [`Mailer`] trait. [`SmtpMailer`] delivers through an
//! SMTP relay, [`LogMailer`] only logs (used when no relay is configured) and
//! [`MemoryMailer`] captures messages for tests.

use crate::config::Settings;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::{Arc, Mutex};

/// A message ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    /// Optional HTML alternative of `text`
    pub html: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<()>;
}

/// Pick the mailer the settings describe
pub fn from_settings(settings: &Settings) -> Result<Arc<dyn Mailer>> {
    match settings.smtp_host.as_deref() {
        Some(host) => {
            tracing::info!("Sending mail through SMTP relay {}:{}", host, settings.smtp_port);
            Ok(Arc::new(SmtpMailer::new(settings, host)?))
        }
        None => {
            tracing::warn!("No SMTP relay configured, outgoing mail will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &Settings, host: &str) -> Result<Self> {
        let from: Mailbox = settings
            .mail_from
            .parse()
            .map_err(|e| AppError::Mail(format!("Invalid sender address: {}", e)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| AppError::Mail(format!("Invalid SMTP relay: {}", e)))?
            .port(settings.smtp_port);

        if let (Some(username), Some(password)) = (&settings.smtp_username, &settings.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, email: OutgoingEmail) -> Result<Message> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| AppError::Mail(format!("Invalid recipient {}: {}", email.to, e)))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject);

        let message = match email.html {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(email.text, html)),
            None => builder.header(ContentType::TEXT_PLAIN).body(email.text),
        };

        message.map_err(|e| AppError::Mail(format!("Failed to build message: {}", e)))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        let recipient = email.to.clone();
        let message = self.build_message(email)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Mail(format!("Failed to send mail to {}: {}", recipient, e)))?;

        tracing::info!("Mail sent to {}", recipient);
        Ok(())
    }
}

/// Writes messages to the log instead of sending them
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Mail not sent (no SMTP relay): {}",
            email.text
        );
        Ok(())
    }
}

/// Keeps every message in memory
#[derive(Clone, Default)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<OutgoingEmail>>>,
    fail: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        if self.fail {
            return Err(AppError::Mail(format!("Refusing to send mail to {}", email.to)));
        }

        match self.sent.lock() {
            Ok(mut sent) => sent.push(email),
            Err(poisoned) => poisoned.into_inner().push(email),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            to: "a@x.com".into(),
            subject: "Reminder".into(),
            text: "body".into(),
            html: None,
        }
    }

    #[tokio::test]
    async fn test_memory_mailer_captures() {
        let mailer = MemoryMailer::new();
        mailer.send(email()).await.unwrap();

        assert_eq!(mailer.sent(), vec![email()]);
    }

    #[tokio::test]
    async fn test_failing_mailer() {
        let mailer = MemoryMailer::failing();

        assert!(mailer.send(email()).await.is_err());
        assert!(mailer.sent().is_empty());
    }

    #[test]
    fn test_smtp_message_with_html_alternative() {
        let settings = Settings::try_parse_from(["fundoo-notes", "--jwt-secret", "s"]).unwrap();
        let mailer = SmtpMailer::new(&settings, "smtp.example.com").unwrap();

        let message = mailer
            .build_message(OutgoingEmail {
                html: Some("<b>body</b>".into()),
                ..email()
            })
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Subject: Reminder"));
        assert!(raw.contains("multipart/alternative"));
    }

    #[test]
    fn test_bad_recipient_rejected() {
        let settings = Settings::try_parse_from(["fundoo-notes", "--jwt-secret", "s"]).unwrap();
        let mailer = SmtpMailer::new(&settings, "smtp.example.com").unwrap();

        let result = mailer.build_message(OutgoingEmail {
            to: "not an address".into(),
            ..email()
        });
        assert!(result.is_err());
    }
}
