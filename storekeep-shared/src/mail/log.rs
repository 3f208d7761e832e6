/// Mailer that writes messages to the log
///
/// Used when no SMTP relay is configured, so links can be copied out of the
/// development console.
use async_trait::async_trait;
use tracing::{debug, info};

use super::{MailError, Mailer, OutboundEmail};

#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl LogMailer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutboundEmail) -> Result<(), MailError> {
        info!(to = %email.to, subject = %email.subject, "SMTP not configured, email logged instead of sent");
        debug!(to = %email.to, body = %email.text_body, "Email body");
        Ok(())
    }
}
