//! Console mailer for development: logs emails instead of sending them.

use super::{Email, EmailError, Mailer};
use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Default)]
pub struct ConsoleMailer;

impl ConsoleMailer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, email: &Email) -> Result<(), EmailError> {
        info!(
            to = %email.to,
            subject = %email.subject,
            body = email.text.as_deref().unwrap_or(""),
            "Email (console delivery)"
        );
        Ok(())
    }
}
