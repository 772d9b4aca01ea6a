use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::info;

use crate::config::SmtpConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp transport: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_mail(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let transport = if config.username.is_empty() {
            // No auth, plaintext: local relay such as Mailpit/Mailhog.
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .port(config.port)
                .build()
        } else {
            let creds = Credentials::new(config.username.clone(), config.password.clone());
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
                .credentials(creds)
                .port(config.port)
                .build()
        };

        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_address).parse()?;

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_mail(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())?;

        self.transport.send(message).await?;
        info!(%to, %subject, "mail sent");
        Ok(())
    }
}

/// Captures outgoing mail instead of delivering it.
#[cfg(test)]
pub struct MockMailer {
    sent: tokio::sync::Mutex<Vec<SentMail>>,
    failure: Option<String>,
}

#[cfg(test)]
#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[cfg(test)]
impl MockMailer {
    pub fn new() -> Self {
        Self {
            sent: tokio::sync::Mutex::new(Vec::new()),
            failure: None,
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            sent: tokio::sync::Mutex::new(Vec::new()),
            failure: Some(message.into()),
        }
    }

    pub async fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[cfg(test)]
impl Default for MockMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[async_trait]
impl Mailer for MockMailer {
    async fn send_mail(&self, to: &str, subject: &str, html_body: &str) -> Result<(), MailError> {
        if let Some(message) = &self.failure {
            return Err(MailError::Other(message.clone()));
        }
        self.sent.lock().await.push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: html_body.to_string(),
        });
        Ok(())
    }
}
