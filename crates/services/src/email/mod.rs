//! Outbound email.
//!
//! The `Mailer` trait abstracts the delivery backend so the invitation flow
//! can run against SMTP in production and a console logger in development
//! and tests.

mod console;
mod smtp;

pub use console::ConsoleMailer;
pub use smtp::SmtpMailer;

use async_trait::async_trait;

/// An email message to be sent
#[derive(Debug, Clone)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: Option<String>,
    pub html: Option<String>,
}

impl Email {
    pub fn new(to: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            text: None,
            html: None,
        }
    }

    /// Set the plain text body
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.text = Some(body.into());
        self
    }

    /// Set the HTML body
    pub fn html(mut self, body: impl Into<String>) -> Self {
        self.html = Some(body.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Invalid email message: {0}")]
    InvalidMessage(String),

    #[error("Failed to send email: {0}")]
    SendFailed(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), EmailError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_builder() {
        let email = Email::new("bob@x.com", "Hello")
            .text("plain body")
            .html("<p>html body</p>");

        assert_eq!(email.to, "bob@x.com");
        assert_eq!(email.subject, "Hello");
        assert_eq!(email.text.as_deref(), Some("plain body"));
        assert_eq!(email.html.as_deref(), Some("<p>html body</p>"));
    }

    #[tokio::test]
    async fn test_console_mailer_accepts_messages() {
        let mailer = ConsoleMailer::new();
        let email = Email::new("bob@x.com", "Hello").text("body");
        mailer.send(&email).await.unwrap();
    }
}
