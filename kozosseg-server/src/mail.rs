use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Message},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::config::Mail as MailSettings;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address {0}")]
    InvalidAddress(String),
    #[error("failed to build message: {0}")]
    Build(String),
    #[error("smtp transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// Build the sender the settings ask for: SMTP when a host is configured,
/// otherwise one that only logs
pub fn sender_from_settings(settings: &MailSettings) -> Result<Arc<dyn MailSender>, MailError> {
    if settings.smtp_host.trim().is_empty() {
        tracing::warn!("No SMTP host configured, outgoing mail will only be logged");
        return Ok(Arc::new(LogMailSender));
    }
    Ok(Arc::new(SmtpMailSender::new(settings)?))
}

pub struct SmtpMailSender {
    transport: SmtpTransport,
    from: String,
}

impl SmtpMailSender {
    pub fn new(settings: &MailSettings) -> Result<Self, MailError> {
        let transport = if settings.smtp_user.is_empty() {
            SmtpTransport::builder_dangerous(&settings.smtp_host)
                .port(settings.smtp_port)
                .build()
        } else {
            let creds = Credentials::new(settings.smtp_user.clone(), settings.smtp_pass.clone());
            SmtpTransport::starttls_relay(&settings.smtp_host)
                .map_err(|e| MailError::Transport(e.to_string()))?
                .port(settings.smtp_port)
                .credentials(creds)
                .build()
        };

        Ok(Self {
            transport,
            from: settings.from.clone(),
        })
    }
}

#[async_trait]
impl MailSender for SmtpMailSender {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|_| MailError::InvalidAddress(self.from.clone()))?,
            )
            .to(mail
                .to
                .parse()
                .map_err(|_| MailError::InvalidAddress(mail.to.clone()))?)
            .subject(mail.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body)
            .map_err(|e| MailError::Build(e.to_string()))?;

        // SmtpTransport blocks; keep it off the async workers
        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?
            .map_err(|e| MailError::Transport(e.to_string()))?;
        tracing::info!("Mail sent to {}", mail.to);
        Ok(())
    }
}

/// Writes mails to the log instead of sending them
pub struct LogMailSender;

#[async_trait]
impl MailSender for LogMailSender {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        tracing::info!(to = %mail.to, subject = %mail.subject, "Mail (not sent): {}", mail.body);
        Ok(())
    }
}

/// Keeps every mail in memory; used by tests to inspect what would be sent
#[derive(Default, Clone)]
pub struct RecordingMailSender {
    sent: Arc<Mutex<Vec<OutgoingMail>>>,
}

impl RecordingMailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl MailSender for RecordingMailSender {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).push(mail);
        Ok(())
    }
}

pub fn activation_mail(to: &str, public_url: &str, guid: &str) -> OutgoingMail {
    OutgoingMail {
        to: to.to_string(),
        subject: "Közösség - fiók aktiválása".to_string(),
        body: format!(
            "Kedves felhasználó!\n\nA regisztráció befejezéséhez kattints az alábbi linkre:\n{}/users/activate/{}\n",
            public_url.trim_end_matches('/'),
            guid
        ),
    }
}

pub fn verification_code_mail(to: &str, code: &str) -> OutgoingMail {
    OutgoingMail {
        to: to.to_string(),
        subject: "Közösség - jelszó visszaállítása".to_string(),
        body: format!(
            "A jelszavad visszaállításához használd az alábbi kódot: {}\n\nA kód 15 percig érvényes.\n",
            code
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_mail_contains_link() {
        let mail = activation_mail("a@b.hu", "http://localhost:3000/", "abc-123");
        assert_eq!(mail.to, "a@b.hu");
        assert!(mail.body.contains("http://localhost:3000/users/activate/abc-123"));
    }

    #[tokio::test]
    async fn test_recording_sender_keeps_mail() {
        let sender = RecordingMailSender::new();
        sender.send(verification_code_mail("a@b.hu", "123456")).await.unwrap();
        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("123456"));
    }

    #[test]
    fn test_empty_host_uses_log_sender() {
        let settings = MailSettings {
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_user: String::new(),
            smtp_pass: String::new(),
            from: "noreply@kozosseg.local".to_string(),
        };
        assert!(sender_from_settings(&settings).is_ok());
    }
}
