/// Mail dispatch
///
/// Verification and password-reset links leave the system through the
/// [`Mailer`] trait. Three implementations exist:
///
/// - [`SmtpMailer`]: STARTTLS relay via lettre
/// - [`LogMailer`]: writes messages to the log, for development without SMTP
/// - [`RecordingMailer`]: keeps messages in memory, for tests
///
/// Sending is awaited by the caller. A failed send is reported, never retried.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use storekeep_shared::auth::token::ActionPurpose;
/// use storekeep_shared::mail::{compose_action_email, ActionEmail};
///
/// let email = compose_action_email(ActionEmail {
///     purpose: ActionPurpose::EmailVerification,
///     to: "ada@example.com",
///     name: "Ada",
///     link: "http://localhost:3000/verification/abc",
///     company_name: "Storekeep",
///     valid_for: Duration::from_secs(900),
/// })
/// .unwrap();
///
/// assert_eq!(email.subject, "New user verification!");
/// assert!(email.text_body.contains("valid for 15 minutes"));
/// ```

use std::time::Duration;

use askama::Template;
use async_trait::async_trait;

use crate::auth::token::ActionPurpose;

pub mod log;
pub mod recording;
pub mod smtp;

pub use log::LogMailer;
pub use recording::RecordingMailer;
pub use smtp::{SmtpMailer, SmtpSettings};

/// Error type for mail dispatch
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// SMTP transport error
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Message could not be assembled
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Sender or recipient is not a valid mailbox
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Delivery refused by the dispatcher
    #[error("Delivery rejected: {0}")]
    Rejected(String),

    /// Template rendering error
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// A fully composed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

/// Outbound mail dispatcher
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Delivers one message
    async fn send(&self, email: OutboundEmail) -> Result<(), MailError>;
}

/// Inputs for a verification or reset message
#[derive(Debug, Clone, Copy)]
pub struct ActionEmail<'a> {
    pub purpose: ActionPurpose,
    pub to: &'a str,
    pub name: &'a str,
    pub link: &'a str,
    pub company_name: &'a str,
    pub valid_for: Duration,
}

/// Verification email, HTML part
#[derive(Template)]
#[template(path = "email/verification.html")]
struct VerificationEmailHtml<'a> {
    name: &'a str,
    link: &'a str,
    company_name: &'a str,
    minutes: u64,
}

/// Verification email, plain text part
#[derive(Template)]
#[template(path = "email/verification.txt")]
struct VerificationEmailText<'a> {
    name: &'a str,
    link: &'a str,
    company_name: &'a str,
    minutes: u64,
}

/// Password reset email, HTML part
#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct ResetEmailHtml<'a> {
    name: &'a str,
    link: &'a str,
    company_name: &'a str,
    minutes: u64,
}

/// Password reset email, plain text part
#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct ResetEmailText<'a> {
    name: &'a str,
    link: &'a str,
    company_name: &'a str,
    minutes: u64,
}

/// Composes the message carrying an action link
///
/// # Errors
///
/// Returns error if a template fails to render.
pub fn compose_action_email(input: ActionEmail<'_>) -> Result<OutboundEmail, MailError> {
    let ActionEmail {
        name,
        link,
        company_name,
        ..
    } = input;
    let minutes = (input.valid_for.as_secs() / 60).max(1);

    let (subject, text_body, html_body) = match input.purpose {
        ActionPurpose::EmailVerification => (
            "New user verification!",
            VerificationEmailText { name, link, company_name, minutes }.render()?,
            VerificationEmailHtml { name, link, company_name, minutes }.render()?,
        ),
        ActionPurpose::PasswordReset => (
            "Password reset request!",
            ResetEmailText { name, link, company_name, minutes }.render()?,
            ResetEmailHtml { name, link, company_name, minutes }.render()?,
        ),
    };

    Ok(OutboundEmail {
        to: input.to.to_string(),
        subject: subject.to_string(),
        text_body,
        html_body,
    })
}
