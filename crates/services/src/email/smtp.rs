//! SMTP mailer using lettre.

use super::{Email, EmailError, Mailer};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::debug;

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build an SMTP mailer from the email configuration. Fails when the
    /// config has no SMTP host or an unparseable from address.
    pub fn from_config(config: &config::EmailConfig) -> Result<Self, EmailError> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| EmailError::InvalidMessage("SMTP host is not configured".to_string()))?;

        let from: Mailbox = config
            .from_address
            .as_deref()
            .unwrap_or("noreply@localhost")
            .parse()
            .map_err(|e| EmailError::InvalidMessage(format!("Invalid from address: {}", e)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| EmailError::SendFailed(format!("Failed to set up SMTP relay: {}", e)))?;

        if let Some(port) = config.smtp_port {
            builder = builder.port(port);
        }
        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, email: &Email) -> Result<Message, EmailError> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| EmailError::InvalidMessage(format!("Invalid recipient: {}", e)))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone());

        let message = match (&email.text, &email.html) {
            (Some(text), Some(html)) => builder
                .multipart(MultiPart::alternative_plain_html(
                    text.clone(),
                    html.clone(),
                ))
                .map_err(|e| EmailError::InvalidMessage(e.to_string()))?,
            (Some(text), None) => builder
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(text.clone()),
                )
                .map_err(|e| EmailError::InvalidMessage(e.to_string()))?,
            (None, Some(html)) => builder
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(html.clone()),
                )
                .map_err(|e| EmailError::InvalidMessage(e.to_string()))?,
            (None, None) => {
                return Err(EmailError::InvalidMessage(
                    "Email has neither text nor html body".to_string(),
                ));
            }
        };

        Ok(message)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<(), EmailError> {
        let message = self.build_message(email)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;
        debug!("Sent email to {}", email.to);
        Ok(())
    }
}
