//! SMTP delivery backend using Lettre.

use crate::backend::{DeliveryBackend, DeliveryReceipt, OutboundEmail};
use crate::error::{DeliveryError, Result};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::PoolConfig;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

/// Pooled connections kept open to the relay.
const POOL_MAX_SIZE: u32 = 4;

/// Relay connection settings.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    /// Relay host, e.g. `smtp.gmail.com`
    pub host: String,
    /// Relay port, usually 587 (STARTTLS) or 465 (implicit TLS)
    pub port: u16,
    /// Implicit TLS from the first byte; otherwise STARTTLS when offered
    pub secure: bool,
    /// Authentication username
    pub username: String,
    /// Authentication password
    pub password: String,
    /// Sender, either `addr@host` or `Name <addr@host>`
    pub from: String,
    /// Per-command timeout
    pub timeout: Duration,
}

/// SMTP backend using a pooled Lettre transport.
///
/// One transport is built at startup and shared for the life of the
/// process; the pool reconnects on its own after idle disconnects.
///
/// # Examples
///
/// ```ignore
/// use notifier_mailer::{SmtpBackend, SmtpSettings};
///
/// let backend = SmtpBackend::new(&SmtpSettings {
///     host: "smtp.gmail.com".to_string(),
///     port: 587,
///     secure: false,
///     username: "user@gmail.com".to_string(),
///     password: "app_password".to_string(),
///     from: "FleetOS <noreply@fleetos.com>".to_string(),
///     timeout: Duration::from_secs(30),
/// })?;
/// ```
#[derive(Clone)]
pub struct SmtpBackend {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpBackend {
    /// Build the transport. Does not open a connection.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::InvalidAddress`] if the sender does not parse
    /// and [`DeliveryError::Transport`] if TLS parameters cannot be built.
    pub fn new(settings: &SmtpSettings) -> Result<Self> {
        let from = parse_mailbox(&settings.from)?;

        let builder = if settings.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                .map_err(|e| DeliveryError::Transport(format!("SMTP relay error: {e}")))?
        } else {
            let tls = TlsParameters::new(settings.host.clone())
                .map_err(|e| DeliveryError::Transport(format!("TLS parameters error: {e}")))?;
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
                .tls(Tls::Opportunistic(tls))
        };

        let transport = builder
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .timeout(Some(settings.timeout))
            .pool_config(PoolConfig::new().max_size(POOL_MAX_SIZE))
            .build();

        tracing::debug!(
            host = %settings.host,
            port = settings.port,
            secure = settings.secure,
            "SMTP transport configured"
        );

        Ok(Self { transport, from })
    }
}

impl DeliveryBackend for SmtpBackend {
    async fn send(&self, email: &OutboundEmail) -> Result<DeliveryReceipt> {
        let message = compose_message(&self.from, email)?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| DeliveryError::Send(e.to_string()))?;

        Ok(DeliveryReceipt {
            message_id: response.first_line().unwrap_or_default().to_string(),
        })
    }

    async fn verify(&self) -> Result<()> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(DeliveryError::Transport(
                "SMTP server did not accept the connection".to_string(),
            )),
            Err(e) => Err(DeliveryError::Transport(e.to_string())),
        }
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e: lettre::address::AddressError| DeliveryError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

/// Assemble a `multipart/alternative` message with text and HTML parts.
fn compose_message(from: &Mailbox, email: &OutboundEmail) -> Result<Message> {
    Message::builder()
        .from(from.clone())
        .to(parse_mailbox(&email.to)?)
        .subject(email.subject.as_str())
        .multipart(MultiPart::alternative_plain_html(
            email.text.clone(),
            email.html.clone(),
        ))
        .map_err(|e| DeliveryError::Build(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn email(to: &str) -> OutboundEmail {
        OutboundEmail {
            to: to.to_string(),
            subject: "FleetOS - Your Registration OTP".to_string(),
            html: "<p>123456</p>".to_string(),
            text: "Your OTP Code: 123456".to_string(),
        }
    }

    #[test]
    fn test_parse_mailbox_accepts_display_name() {
        let mailbox = parse_mailbox("FleetOS <noreply@fleetos.com>").unwrap();
        assert_eq!(mailbox.name.as_deref(), Some("FleetOS"));
        assert_eq!(mailbox.email.to_string(), "noreply@fleetos.com");
    }

    #[test]
    fn test_parse_mailbox_rejects_garbage() {
        let err = parse_mailbox("not an address").unwrap_err();
        assert!(matches!(err, DeliveryError::InvalidAddress { .. }));
    }

    #[test]
    fn test_compose_message_has_both_alternatives() {
        let from = parse_mailbox("noreply@fleetos.com").unwrap();
        let message = compose_message(&from, &email("a@b.com")).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Subject: FleetOS - Your Registration OTP"));
        assert!(raw.contains("To: a@b.com"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("text/html"));
    }

    #[test]
    fn test_compose_message_rejects_bad_recipient() {
        let from = parse_mailbox("noreply@fleetos.com").unwrap();
        let err = compose_message(&from, &email("nobody")).unwrap_err();
        assert!(matches!(err, DeliveryError::InvalidAddress { address, .. } if address == "nobody"));
    }
}
