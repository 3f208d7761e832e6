/// Account lifecycle
///
/// Orchestrates the token service, the credential store and the mail
/// dispatcher into the user-facing workflows:
///
/// ```text
/// Unregistered --signup--> PendingVerification --verify--> Verified
/// Verified --request_password_reset--> ResetRequested --reset_password--> Verified
/// ```
///
/// Every store and mail call is bounded by `AccountSettings::io_timeout`.
/// A timeout is reported as [`AccountError::Timeout`], a server error.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use storekeep_shared::accounts::{AccountService, AccountSettings};
/// use storekeep_shared::auth::token::{TokenPolicy, TokenService};
/// use storekeep_shared::mail::RecordingMailer;
/// use storekeep_shared::store::MemoryCredentialStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mailer = Arc::new(RecordingMailer::new());
/// let accounts = AccountService::new(
///     Arc::new(MemoryCredentialStore::new()),
///     mailer.clone(),
///     TokenService::new("a-secret-that-is-at-least-32-bytes", TokenPolicy::default()),
///     AccountSettings::default(),
/// );
///
/// accounts.signup("Ada", "ada@example.com", "Str0ng!pass").await?;
/// let link_token = mailer.last_link_token("ada@example.com").unwrap();
/// let session = accounts.verify(&link_token).await?;
/// assert_eq!(session.name, "Ada");
/// # Ok(())
/// # }
/// ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::auth::gate::{self, AuthenticatedUser, GateError};
use crate::auth::password::{hash_password, is_strong_password, verify_password, PasswordError};
use crate::auth::token::{token_digest, ActionPurpose, TokenError, TokenPurpose, TokenService};
use crate::mail::{compose_action_email, ActionEmail, MailError, Mailer};
use crate::models::action_token::NewActionToken;
use crate::models::user::{CreateUser, User};
use crate::store::{CredentialStore, StoreError};
use crate::validation::{is_blank, normalize_email, valid_email};

/// Request field an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Email,
    Password,
    Token,
    OldPassword,
    NewPassword,
}

impl Field {
    /// Key used in the response envelope
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Email => "email",
            Field::Password => "password",
            Field::Token => "token",
            Field::OldPassword => "oldPassword",
            Field::NewPassword => "newPassword",
        }
    }
}

/// Failure classes reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing, empty or malformed field
    Validation,

    /// Bad credentials, invalid token, unverified account
    Auth,

    /// Duplicate registration, token already consumed
    Conflict,

    /// Store or mail failure
    Server,
}

/// Error type for lifecycle operations
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Field '{}' is empty", .0.as_str())]
    EmptyField(Field),

    #[error("Invalid email format")]
    InvalidEmailFormat,

    #[error("Field '{}' does not meet the password policy", .0.as_str())]
    WeakPassword(Field),

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    #[error("Email not registered")]
    UnregisteredEmail,

    #[error("Incorrect password")]
    IncorrectPassword,

    /// Bad signature, expired, wrong purpose or already redeemed
    #[error("Token invalid or expired")]
    InvalidOrExpiredToken,

    #[error("Incorrect old password")]
    IncorrectOldPassword,

    #[error("New password equals old password")]
    PasswordUnchanged,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Mail(#[from] MailError),

    /// Token could not be signed
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("Store or mail call timed out")]
    Timeout,
}

impl AccountError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccountError::EmptyField(_)
            | AccountError::InvalidEmailFormat
            | AccountError::WeakPassword(_)
            | AccountError::PasswordUnchanged => ErrorKind::Validation,
            AccountError::UnregisteredEmail
            | AccountError::IncorrectPassword
            | AccountError::IncorrectOldPassword => ErrorKind::Auth,
            AccountError::EmailAlreadyRegistered | AccountError::InvalidOrExpiredToken => {
                ErrorKind::Conflict
            }
            AccountError::Store(_)
            | AccountError::Mail(_)
            | AccountError::Token(_)
            | AccountError::Password(_)
            | AccountError::Timeout => ErrorKind::Server,
        }
    }
}

/// Result type alias for lifecycle operations
pub type AccountResult<T> = Result<T, AccountError>;

/// A freshly issued session token
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub name: String,
}

/// Result of a login attempt with correct credentials
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Authenticated(Session),

    /// Account not verified yet; a new verification link was sent
    VerificationPending { email: String },
}

/// Non-secret settings for the lifecycle service
#[derive(Debug, Clone)]
pub struct AccountSettings {
    /// Base of emailed links, `{site_url}/verification/{token}`
    pub site_url: String,

    /// Signature used in emails
    pub company_name: String,

    /// Bound on each store and mail call
    pub io_timeout: Duration,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            site_url: "http://localhost:3000".to_string(),
            company_name: "Storekeep".to_string(),
            io_timeout: Duration::from_secs(10),
        }
    }
}

/// Account lifecycle service
///
/// Cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    mailer: Arc<dyn Mailer>,
    tokens: TokenService,
    settings: AccountSettings,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        mailer: Arc<dyn Mailer>,
        tokens: TokenService,
        settings: AccountSettings,
    ) -> Self {
        Self {
            store,
            mailer,
            tokens,
            settings,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn settings(&self) -> &AccountSettings {
        &self.settings
    }

    /// Registers an unverified account and mails a verification link
    ///
    /// Returns the normalized email the link was sent to.
    pub async fn signup(&self, name: &str, email: &str, password: &str) -> AccountResult<String> {
        require(name, Field::Name)?;
        require(email, Field::Email)?;
        require(password, Field::Password)?;

        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(AccountError::InvalidEmailFormat);
        }
        if !is_strong_password(password) {
            return Err(AccountError::WeakPassword(Field::Password));
        }

        if self.bounded(self.store.find_user(&email)).await?.is_some() {
            return Err(AccountError::EmailAlreadyRegistered);
        }

        let password_hash = hash_password(password)?;
        let user = match self
            .bounded(self.store.insert_user(CreateUser {
                email,
                name: name.trim().to_string(),
                password_hash,
            }))
            .await
        {
            Err(AccountError::Store(StoreError::DuplicateEmail)) => {
                return Err(AccountError::EmailAlreadyRegistered)
            }
            other => other?,
        };

        info!(email = %user.email, "Account registered, pending verification");

        self.send_action_link(&user, ActionPurpose::EmailVerification)
            .await?;

        Ok(user.email)
    }

    /// Checks credentials and issues a session for verified accounts
    ///
    /// Unverified accounts get a fresh verification link instead.
    pub async fn login(&self, email: &str, password: &str) -> AccountResult<LoginOutcome> {
        require(email, Field::Email)?;
        require(password, Field::Password)?;

        let email = normalize_email(email);
        let user = self
            .bounded(self.store.find_user(&email))
            .await?
            .ok_or(AccountError::UnregisteredEmail)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AccountError::IncorrectPassword);
        }

        if !user.verified {
            self.send_action_link(&user, ActionPurpose::EmailVerification)
                .await?;
            return Ok(LoginOutcome::VerificationPending { email: user.email });
        }

        Ok(LoginOutcome::Authenticated(self.session_for(&user)?))
    }

    /// Redeems a verification link and signs the account in
    pub async fn verify(&self, token: &str) -> AccountResult<Session> {
        require(token, Field::Token)?;

        let email = self.action_subject(token, ActionPurpose::EmailVerification)?;
        let user = self
            .bounded(self.store.redeem_verification(&token_digest(token), &email))
            .await?
            .ok_or(AccountError::InvalidOrExpiredToken)?;

        info!(email = %user.email, "Account verified");

        self.session_for(&user)
    }

    /// Mails a password reset link to a registered address
    ///
    /// Returns the normalized email the link was sent to.
    pub async fn request_password_reset(&self, email: &str) -> AccountResult<String> {
        require(email, Field::Email)?;

        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(AccountError::InvalidEmailFormat);
        }

        let user = self
            .bounded(self.store.find_user(&email))
            .await?
            .ok_or(AccountError::UnregisteredEmail)?;

        self.send_action_link(&user, ActionPurpose::PasswordReset)
            .await?;

        info!(email = %user.email, "Password reset requested");
        Ok(user.email)
    }

    /// Redeems a reset link, stores the new password and signs the account in
    pub async fn reset_password(&self, token: &str, password: &str) -> AccountResult<Session> {
        require(token, Field::Token)?;
        require(password, Field::Password)?;

        if !is_strong_password(password) {
            return Err(AccountError::WeakPassword(Field::Password));
        }

        let email = self.action_subject(token, ActionPurpose::PasswordReset)?;
        let password_hash = hash_password(password)?;

        let user = self
            .bounded(
                self.store
                    .redeem_password_reset(&token_digest(token), &email, &password_hash),
            )
            .await?
            .ok_or(AccountError::InvalidOrExpiredToken)?;

        info!(email = %user.email, "Password reset");

        self.session_for(&user)
    }

    /// Replaces the password of an authenticated account
    pub async fn change_password(
        &self,
        user: &AuthenticatedUser,
        old_password: &str,
        new_password: &str,
    ) -> AccountResult<()> {
        require(old_password, Field::OldPassword)?;
        require(new_password, Field::NewPassword)?;

        if !verify_password(old_password, &user.password_hash)? {
            return Err(AccountError::IncorrectOldPassword);
        }
        if old_password == new_password {
            return Err(AccountError::PasswordUnchanged);
        }
        if !is_strong_password(new_password) {
            return Err(AccountError::WeakPassword(Field::NewPassword));
        }

        let password_hash = hash_password(new_password)?;
        if !self
            .bounded(self.store.update_password(&user.email, &password_hash))
            .await?
        {
            return Err(AccountError::UnregisteredEmail);
        }

        info!(email = %user.email, "Password changed");
        Ok(())
    }

    /// Removes an authenticated account along with its outstanding tokens
    pub async fn delete_account(&self, user: &AuthenticatedUser) -> AccountResult<()> {
        if !self.bounded(self.store.delete_user(&user.email)).await? {
            return Err(AccountError::UnregisteredEmail);
        }

        info!(email = %user.email, "Account deleted");
        Ok(())
    }

    /// Runs the authentication gate with the store call bounded
    pub async fn authenticate(&self, token: Option<&str>) -> Result<AuthenticatedUser, GateError> {
        let check = gate::authenticate(&self.tokens, self.store.as_ref(), token);

        tokio::time::timeout(self.settings.io_timeout, check)
            .await
            .unwrap_or_else(|_| {
                Err(GateError::Store(StoreError::Unavailable(
                    "timed out".to_string(),
                )))
            })
    }

    /// True if the store answers a ping in time
    pub async fn store_healthy(&self) -> bool {
        self.bounded(self.store.ping()).await.is_ok()
    }

    async fn bounded<T, E>(&self, call: impl Future<Output = Result<T, E>>) -> AccountResult<T>
    where
        AccountError: From<E>,
    {
        match tokio::time::timeout(self.settings.io_timeout, call).await {
            Ok(result) => result.map_err(AccountError::from),
            Err(_) => {
                warn!(timeout = ?self.settings.io_timeout, "I/O call timed out");
                Err(AccountError::Timeout)
            }
        }
    }

    /// Verifies an action token and returns its subject
    fn action_subject(&self, token: &str, purpose: ActionPurpose) -> AccountResult<String> {
        let claims = self
            .tokens
            .verify(token)
            .map_err(|_| AccountError::InvalidOrExpiredToken)?;

        if claims.purpose.action() != Some(purpose) {
            return Err(AccountError::InvalidOrExpiredToken);
        }

        Ok(claims.sub)
    }

    fn session_for(&self, user: &User) -> AccountResult<Session> {
        let token = self.tokens.issue(
            &user.email,
            TokenPurpose::Session {
                name: user.name.clone(),
            },
        )?;

        Ok(Session {
            token,
            name: user.name.clone(),
        })
    }

    /// Issues an action token, records its digest and mails the link
    async fn send_action_link(&self, user: &User, purpose: ActionPurpose) -> AccountResult<()> {
        let action_ttl = self.tokens.policy().action_ttl;
        let token = self.tokens.issue(&user.email, purpose.token_purpose())?;
        let expires_at = Utc::now()
            .checked_add_signed(action_ttl)
            .ok_or_else(|| TokenError::Create("Token lifetime out of range".to_string()))?;

        self.bounded(self.store.insert_action_token(NewActionToken {
            token_hash: token_digest(&token),
            user_id: user.id,
            purpose,
            expires_at,
        }))
        .await?;

        let link = format!(
            "{}/verification/{}",
            self.settings.site_url.trim_end_matches('/'),
            token
        );
        let email = compose_action_email(ActionEmail {
            purpose,
            to: &user.email,
            name: &user.name,
            link: &link,
            company_name: &self.settings.company_name,
            valid_for: action_ttl.to_std().unwrap_or_default(),
        })?;

        self.bounded(self.mailer.send(email)).await
    }
}

fn require(value: &str, field: Field) -> AccountResult<()> {
    if is_blank(Some(value)) {
        return Err(AccountError::EmptyField(field));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::TokenPolicy;
    use crate::mail::RecordingMailer;
    use crate::store::MemoryCredentialStore;
    use async_trait::async_trait;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";
    const PASSWORD: &str = "Str0ng!pass";

    struct Harness {
        accounts: AccountService,
        store: Arc<MemoryCredentialStore>,
        mailer: Arc<RecordingMailer>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryCredentialStore::new());
        let mailer = Arc::new(RecordingMailer::new());
        let accounts = AccountService::new(
            store.clone(),
            mailer.clone(),
            TokenService::new(SECRET, TokenPolicy::default()),
            AccountSettings {
                site_url: "https://shop.example/".to_string(),
                ..Default::default()
            },
        );

        Harness {
            accounts,
            store,
            mailer,
        }
    }

    async fn verified_account(h: &Harness, email: &str) -> Session {
        h.accounts.signup("Ada", email, PASSWORD).await.unwrap();
        let token = h.mailer.last_link_token(email).unwrap();
        h.accounts.verify(&token).await.unwrap()
    }

    async fn gate_user(h: &Harness, session: &Session) -> AuthenticatedUser {
        h.accounts.authenticate(Some(&session.token)).await.unwrap()
    }

    #[tokio::test]
    async fn test_signup_sends_verification_link() {
        let h = harness();

        let email = h.accounts.signup("Ada", " Ada@Example.com ", PASSWORD).await.unwrap();
        assert_eq!(email, "ada@example.com");

        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ada@example.com");
        assert_eq!(sent[0].subject, "New user verification!");
        assert!(sent[0].text_body.contains("https://shop.example/verification/"));

        let user = h.store.find_user("ada@example.com").await.unwrap().unwrap();
        assert!(!user.verified);
        assert_ne!(user.password_hash, PASSWORD);
        assert_eq!(h.store.action_token_count().await, 1);
    }

    #[tokio::test]
    async fn test_signup_validation_order() {
        let h = harness();

        let cases = [
            ("", "a@b.com", PASSWORD, "name"),
            ("Ada", " ", PASSWORD, "email"),
            ("Ada", "a@b.com", "", "password"),
        ];
        for (name, email, password, field) in cases {
            match h.accounts.signup(name, email, password).await {
                Err(AccountError::EmptyField(f)) => assert_eq!(f.as_str(), field),
                other => panic!("expected empty {}, got {:?}", field, other),
            }
        }

        assert!(matches!(
            h.accounts.signup("Ada", "not-an-email", PASSWORD).await,
            Err(AccountError::InvalidEmailFormat)
        ));
        assert!(matches!(
            h.accounts.signup("Ada", "a@b.com", "weakpass").await,
            Err(AccountError::WeakPassword(Field::Password))
        ));
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_signup_leaves_existing_row() {
        let h = harness();
        h.accounts.signup("Ada", "ada@example.com", PASSWORD).await.unwrap();
        let before = h.store.find_user("ada@example.com").await.unwrap().unwrap();

        let err = h
            .accounts
            .signup("Eve", "ADA@example.com", "Diff3rent!pw")
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::EmailAlreadyRegistered));
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let after = h.store.find_user("ada@example.com").await.unwrap().unwrap();
        assert_eq!(after.name, before.name);
        assert_eq!(after.password_hash, before.password_hash);
    }

    #[tokio::test]
    async fn test_login_before_verification_resends_link() {
        let h = harness();
        h.accounts.signup("Ada", "ada@example.com", PASSWORD).await.unwrap();

        let outcome = h.accounts.login("ada@example.com", PASSWORD).await.unwrap();
        assert!(matches!(outcome, LoginOutcome::VerificationPending { ref email } if email == "ada@example.com"));
        assert_eq!(h.mailer.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_login_after_verification_issues_session() {
        let h = harness();
        verified_account(&h, "ada@example.com").await;

        match h.accounts.login("ada@example.com", PASSWORD).await.unwrap() {
            LoginOutcome::Authenticated(session) => {
                assert_eq!(session.name, "Ada");
                let claims = h.accounts.tokens().verify(&session.token).unwrap();
                assert_eq!(claims.sub, "ada@example.com");
                assert_eq!(claims.exp - claims.iat, 3600);
            }
            other => panic!("expected session, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_login_failures() {
        let h = harness();
        verified_account(&h, "ada@example.com").await;

        assert!(matches!(
            h.accounts.login("bob@example.com", PASSWORD).await,
            Err(AccountError::UnregisteredEmail)
        ));
        assert!(matches!(
            h.accounts.login("ada@example.com", "Wr0ng!pass").await,
            Err(AccountError::IncorrectPassword)
        ));
    }

    #[tokio::test]
    async fn test_verify_token_is_single_use() {
        let h = harness();
        h.accounts.signup("Ada", "ada@example.com", PASSWORD).await.unwrap();
        let token = h.mailer.last_link_token("ada@example.com").unwrap();

        h.accounts.verify(&token).await.unwrap();
        assert!(h.store.find_user("ada@example.com").await.unwrap().unwrap().verified);

        assert!(matches!(
            h.accounts.verify(&token).await,
            Err(AccountError::InvalidOrExpiredToken)
        ));
    }

    #[tokio::test]
    async fn test_verify_rejects_reset_and_session_tokens() {
        let h = harness();
        let session = verified_account(&h, "ada@example.com").await;
        h.accounts.request_password_reset("ada@example.com").await.unwrap();
        let reset = h.mailer.last_link_token("ada@example.com").unwrap();

        for token in [reset.as_str(), session.token.as_str(), "not-a-token"] {
            assert!(matches!(
                h.accounts.verify(token).await,
                Err(AccountError::InvalidOrExpiredToken)
            ));
        }

        // the reset token was not consumed by the failed verify
        h.accounts.reset_password(&reset, "N3w!password").await.unwrap();
    }

    #[tokio::test]
    async fn test_signed_token_without_registry_row_is_rejected() {
        let h = harness();
        h.accounts.signup("Ada", "ada@example.com", PASSWORD).await.unwrap();

        let unregistered = h
            .accounts
            .tokens()
            .issue("ada@example.com", TokenPurpose::EmailVerification)
            .unwrap();

        assert!(matches!(
            h.accounts.verify(&unregistered).await,
            Err(AccountError::InvalidOrExpiredToken)
        ));
    }

    #[tokio::test]
    async fn test_reset_password_flow() {
        let h = harness();
        verified_account(&h, "ada@example.com").await;

        let sent_to = h.accounts.request_password_reset("ada@example.com").await.unwrap();
        assert_eq!(sent_to, "ada@example.com");
        let email = h.mailer.sent().pop().unwrap();
        assert_eq!(email.subject, "Password reset request!");

        let reset = h.mailer.last_link_token("ada@example.com").unwrap();
        let session = h.accounts.reset_password(&reset, "N3w!password").await.unwrap();
        assert_eq!(session.name, "Ada");

        assert!(matches!(
            h.accounts.login("ada@example.com", PASSWORD).await,
            Err(AccountError::IncorrectPassword)
        ));
        assert!(matches!(
            h.accounts.login("ada@example.com", "N3w!password").await,
            Ok(LoginOutcome::Authenticated(_))
        ));
    }

    #[tokio::test]
    async fn test_reset_rejects_weak_password_and_verify_token() {
        let h = harness();
        h.accounts.signup("Ada", "ada@example.com", PASSWORD).await.unwrap();
        let verify = h.mailer.last_link_token("ada@example.com").unwrap();

        assert!(matches!(
            h.accounts.reset_password(&verify, "weak").await,
            Err(AccountError::WeakPassword(Field::Password))
        ));
        assert!(matches!(
            h.accounts.reset_password(&verify, "N3w!password").await,
            Err(AccountError::InvalidOrExpiredToken)
        ));
    }

    #[tokio::test]
    async fn test_request_reset_failures() {
        let h = harness();

        assert!(matches!(
            h.accounts.request_password_reset("").await,
            Err(AccountError::EmptyField(Field::Email))
        ));
        assert!(matches!(
            h.accounts.request_password_reset("nope").await,
            Err(AccountError::InvalidEmailFormat)
        ));
        assert!(matches!(
            h.accounts.request_password_reset("ghost@example.com").await,
            Err(AccountError::UnregisteredEmail)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_reset_redemption_has_one_winner() {
        let h = harness();
        verified_account(&h, "ada@example.com").await;
        h.accounts.request_password_reset("ada@example.com").await.unwrap();
        let reset = h.mailer.last_link_token("ada@example.com").unwrap();

        let (first, second) = tokio::join!(
            h.accounts.reset_password(&reset, "F1rst!password"),
            h.accounts.reset_password(&reset, "S3cond!password"),
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AccountError::InvalidOrExpiredToken))));
    }

    #[tokio::test]
    async fn test_change_password() {
        let h = harness();
        let session = verified_account(&h, "ada@example.com").await;
        let user = gate_user(&h, &session).await;

        assert!(matches!(
            h.accounts.change_password(&user, "", "N3w!password").await,
            Err(AccountError::EmptyField(Field::OldPassword))
        ));
        assert!(matches!(
            h.accounts.change_password(&user, "Wr0ng!pass", "N3w!password").await,
            Err(AccountError::IncorrectOldPassword)
        ));
        assert!(matches!(
            h.accounts.change_password(&user, PASSWORD, PASSWORD).await,
            Err(AccountError::PasswordUnchanged)
        ));
        assert!(matches!(
            h.accounts.change_password(&user, PASSWORD, "weak").await,
            Err(AccountError::WeakPassword(Field::NewPassword))
        ));

        h.accounts.change_password(&user, PASSWORD, "N3w!password").await.unwrap();
        assert!(matches!(
            h.accounts.login("ada@example.com", "N3w!password").await,
            Ok(LoginOutcome::Authenticated(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_account_invalidates_session() {
        let h = harness();
        let session = verified_account(&h, "ada@example.com").await;
        h.accounts.request_password_reset("ada@example.com").await.unwrap();
        let user = gate_user(&h, &session).await;

        h.accounts.delete_account(&user).await.unwrap();

        assert_eq!(h.store.action_token_count().await, 0);
        assert!(matches!(
            h.accounts.authenticate(Some(&session.token)).await,
            Err(GateError::UnknownAccount)
        ));
    }

    #[tokio::test]
    async fn test_mail_failure_is_server_error() {
        let h = harness();
        h.mailer.set_failing(true);

        let err = h
            .accounts
            .signup("Ada", "ada@example.com", PASSWORD)
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::Mail(_)));
        assert_eq!(err.kind(), ErrorKind::Server);
    }

    #[tokio::test]
    async fn test_store_outage_is_server_error() {
        let h = harness();
        h.store.set_offline(true);

        let err = h.accounts.login("ada@example.com", PASSWORD).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Server);
        assert!(!h.accounts.store_healthy().await);
    }

    struct StalledStore;

    #[async_trait]
    impl CredentialStore for StalledStore {
        async fn find_user(&self, _: &str) -> crate::store::StoreResult<Option<User>> {
            std::future::pending().await
        }
        async fn insert_user(&self, _: CreateUser) -> crate::store::StoreResult<User> {
            std::future::pending().await
        }
        async fn update_password(&self, _: &str, _: &str) -> crate::store::StoreResult<bool> {
            std::future::pending().await
        }
        async fn delete_user(&self, _: &str) -> crate::store::StoreResult<bool> {
            std::future::pending().await
        }
        async fn insert_action_token(&self, _: NewActionToken) -> crate::store::StoreResult<()> {
            std::future::pending().await
        }
        async fn redeem_verification(&self, _: &str, _: &str) -> crate::store::StoreResult<Option<User>> {
            std::future::pending().await
        }
        async fn redeem_password_reset(
            &self,
            _: &str,
            _: &str,
            _: &str,
        ) -> crate::store::StoreResult<Option<User>> {
            std::future::pending().await
        }
        async fn ping(&self) -> crate::store::StoreResult<()> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_store_times_out() {
        let tokens = TokenService::new(SECRET, TokenPolicy::default());
        let session = tokens
            .issue("ada@example.com", TokenPurpose::Session { name: "Ada".to_string() })
            .unwrap();
        let accounts = AccountService::new(
            Arc::new(StalledStore),
            Arc::new(RecordingMailer::new()),
            tokens,
            AccountSettings::default(),
        );

        assert!(matches!(
            accounts.login("ada@example.com", PASSWORD).await,
            Err(AccountError::Timeout)
        ));
        assert!(matches!(
            accounts.authenticate(Some(&session)).await,
            Err(GateError::Store(StoreError::Unavailable(_)))
        ));
    }

    #[tokio::test]
    async fn test_out_of_range_action_ttl_is_server_error() {
        let mailer = Arc::new(RecordingMailer::new());
        let accounts = AccountService::new(
            Arc::new(MemoryCredentialStore::new()),
            mailer.clone(),
            TokenService::new(
                SECRET,
                TokenPolicy {
                    session_ttl: chrono::Duration::hours(1),
                    action_ttl: chrono::Duration::minutes(200_000_000_000),
                },
            ),
            AccountSettings::default(),
        );

        let err = accounts.signup("Ada", "ada@example.com", PASSWORD).await.unwrap_err();
        assert!(matches!(err, AccountError::Token(TokenError::Create(_))));
        assert_eq!(err.kind(), ErrorKind::Server);
        assert!(mailer.sent().is_empty());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(AccountError::EmptyField(Field::Email).kind(), ErrorKind::Validation);
        assert_eq!(AccountError::IncorrectPassword.kind(), ErrorKind::Auth);
        assert_eq!(AccountError::InvalidOrExpiredToken.kind(), ErrorKind::Conflict);
        assert_eq!(AccountError::Timeout.kind(), ErrorKind::Server);
    }
}
