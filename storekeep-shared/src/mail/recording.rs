/// In-memory mailer for tests
///
/// # Example
///
/// ```
/// use storekeep_shared::mail::{Mailer, OutboundEmail, RecordingMailer};
///
/// # async fn example() {
/// let mailer = RecordingMailer::new();
/// mailer.send(OutboundEmail {
///     to: "ada@example.com".into(),
///     subject: "Hi".into(),
///     text_body: "see https://x/verification/abc".into(),
///     html_body: String::new(),
/// }).await.unwrap();
///
/// assert_eq!(mailer.sent().len(), 1);
/// assert_eq!(mailer.last_link_token("ada@example.com").as_deref(), Some("abc"));
/// # }
/// ```
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{MailError, Mailer, OutboundEmail};

#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutboundEmail>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent sends fail with [`MailError::Rejected`]
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every message delivered so far, oldest first
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Token from the `/verification/{token}` link of the newest message to `to`
    pub fn last_link_token(&self, to: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|email| email.to == to)
            .and_then(|email| {
                let (_, rest) = email.text_body.split_once("/verification/")?;
                rest.split_whitespace().next().map(str::to_string)
            })
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutboundEmail) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Rejected("recording mailer set to fail".to_string()));
        }

        self.sent
            .lock()
            .map_err(|_| MailError::Rejected("recording mailer poisoned".to_string()))?
            .push(email);
        Ok(())
    }
}
