//! Outbound email transport using the `lettre` crate.

use async_trait::async_trait;
use lettre::message::MultiPart;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::schema::Notifier;

/// A fully rendered notification email.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Error type for building and sending notification emails.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid mailbox address {address:?}: {source}")]
    Address {
        address: String,
        source: lettre::address::AddressError,
    },

    #[error("failed to build email: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("failed to resolve SMTP credentials: {0}")]
    Credentials(String),

    #[error("failed to create SMTP transport: {0}")]
    Transport(lettre::transport::smtp::Error),

    #[error("failed to send email: {0}")]
    Send(lettre::transport::smtp::Error),
}

/// Outbound email-sending collaborator.
///
/// The gateway only renders and hands off; delivery retries and
/// availability are the transport's own concern.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingEmail) -> Result<(), MailError>;
}

/// Creates one transport per configured notifier at startup.
pub trait MailerFactory {
    fn create(&self, notifier: &Notifier) -> Result<std::sync::Arc<dyn Mailer>, MailError>;
}

/// Production mailer speaking SMTP over TLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Build a transport for the notifier's SMTP settings, resolving
    /// credentials from the environment when configured that way.
    pub fn from_notifier(notifier: &Notifier) -> Result<Self, MailError> {
        let username = resolve_credential(&notifier.username, &notifier.username_env, "username")?;
        let password = resolve_credential(&notifier.password, &notifier.password_env, "password")?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&notifier.host)
            .map_err(MailError::Transport)?
            .port(notifier.port)
            .credentials(Credentials::new(username, password))
            .build();

        Ok(Self { transport })
    }
}

fn resolve_credential(literal: &str, env_var: &str, what: &str) -> Result<String, MailError> {
    if !literal.is_empty() {
        return Ok(literal.to_string());
    }

    std::env::var(env_var).map_err(|_| {
        MailError::Credentials(format!(
            "environment variable {env_var:?} for the SMTP {what} is not set"
        ))
    })
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &OutgoingEmail) -> Result<(), MailError> {
        let from = mail.from.parse().map_err(|source| MailError::Address {
            address: mail.from.clone(),
            source,
        })?;
        let to = mail.to.parse().map_err(|source| MailError::Address {
            address: mail.to.clone(),
            source,
        })?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(&mail.subject)
            .multipart(MultiPart::alternative_plain_html(
                mail.text_body.clone(),
                mail.html_body.clone(),
            ))?;

        self.transport
            .send(message)
            .await
            .map_err(MailError::Send)?;

        Ok(())
    }
}

/// Factory building [`SmtpMailer`]s from notifier configs.
pub struct SmtpMailerFactory;

impl MailerFactory for SmtpMailerFactory {
    fn create(&self, notifier: &Notifier) -> Result<std::sync::Arc<dyn Mailer>, MailError> {
        Ok(std::sync::Arc::new(SmtpMailer::from_notifier(notifier)?))
    }
}
