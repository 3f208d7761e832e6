/// Signed, time-limited bearer tokens
///
/// One HS256 signing primitive serves two jobs: session credentials and
/// single-purpose action tokens (email verification, password reset). The
/// job is carried in a tagged `purpose` claim and selects the lifetime:
///
/// - **Session**: 1 hour by default, carries the display name
/// - **Email verification / password reset**: 15 minutes by default
///
/// Action tokens are additionally recorded in the token registry (by digest,
/// see [`token_digest`]) so they can be redeemed exactly once.
///
/// # Example
///
/// ```
/// use storekeep_shared::auth::token::{TokenPolicy, TokenPurpose, TokenService};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let tokens = TokenService::new("a-secret-that-is-at-least-32-bytes", TokenPolicy::default());
///
/// let token = tokens.issue("user@example.com", TokenPurpose::EmailVerification)?;
/// let claims = tokens.verify(&token)?;
/// assert_eq!(claims.sub, "user@example.com");
/// assert_eq!(claims.purpose, TokenPurpose::EmailVerification);
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Issuer written into every token
pub const ISSUER: &str = "storekeep";

/// Error type for token operations
///
/// `Expired` and `Invalid` are kept apart so callers can log the difference,
/// but handlers collapse both into one "invalid or expired" answer.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Failed to sign a token
    #[error("Failed to create token: {0}")]
    Create(String),

    /// Signature valid but the token is past its expiry
    #[error("Token has expired")]
    Expired,

    /// Bad signature, wrong issuer or malformed token
    #[error("Invalid token: {0}")]
    Invalid(String),
}

/// What a token authorizes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "purpose", rename_all = "snake_case")]
pub enum TokenPurpose {
    /// Bearer credential for authenticated requests
    Session {
        /// Display name at the time of issue
        name: String,
    },

    /// Single-use link proving ownership of the email address
    EmailVerification,

    /// Single-use link allowing the password to be replaced
    PasswordReset,
}

impl TokenPurpose {
    /// Registry purpose for single-use tokens, `None` for sessions
    pub fn action(&self) -> Option<ActionPurpose> {
        match self {
            TokenPurpose::Session { .. } => None,
            TokenPurpose::EmailVerification => Some(ActionPurpose::EmailVerification),
            TokenPurpose::PasswordReset => Some(ActionPurpose::PasswordReset),
        }
    }
}

/// Purpose of a single-use token as stored in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionPurpose {
    /// Email verification link
    #[serde(rename = "verify")]
    EmailVerification,

    /// Password reset link
    #[serde(rename = "password-reset")]
    PasswordReset,
}

impl ActionPurpose {
    /// Registry column value
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionPurpose::EmailVerification => "verify",
            ActionPurpose::PasswordReset => "password-reset",
        }
    }

    /// The claim that tokens for this action carry
    pub fn token_purpose(&self) -> TokenPurpose {
        match self {
            ActionPurpose::EmailVerification => TokenPurpose::EmailVerification,
            ActionPurpose::PasswordReset => TokenPurpose::PasswordReset,
        }
    }
}

/// JWT claims
///
/// - `sub`: account email
/// - `iss`: always [`ISSUER`]
/// - `iat` / `nbf` / `exp`: Unix timestamps
/// - `jti`: random id, keeps two tokens minted in the same second distinct
/// - `purpose` (flattened): see [`TokenPurpose`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - account email
    pub sub: String,

    /// Issuer
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Token id
    pub jti: Uuid,

    /// Purpose tag and its payload
    #[serde(flatten)]
    pub purpose: TokenPurpose,
}

impl Claims {
    /// Creates claims expiring `expires_in` from now
    ///
    /// Fails when the expiry falls outside the representable date range.
    pub fn with_expiration(
        subject: impl Into<String>,
        purpose: TokenPurpose,
        expires_in: Duration,
    ) -> Result<Self, TokenError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(expires_in)
            .ok_or_else(|| TokenError::Create("Token lifetime out of range".to_string()))?;

        Ok(Self {
            sub: subject.into(),
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4(),
            purpose,
        })
    }
}

/// Lifetimes per token purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPolicy {
    /// Session token lifetime
    pub session_ttl: Duration,

    /// Verification and reset token lifetime
    pub action_ttl: Duration,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            session_ttl: Duration::hours(1),
            action_ttl: Duration::minutes(15),
        }
    }
}

impl TokenPolicy {
    /// Lifetime for a token of the given purpose
    pub fn ttl_for(&self, purpose: &TokenPurpose) -> Duration {
        match purpose {
            TokenPurpose::Session { .. } => self.session_ttl,
            TokenPurpose::EmailVerification | TokenPurpose::PasswordReset => self.action_ttl,
        }
    }
}

/// Issues and verifies tokens with a process-wide secret
///
/// Holds no state besides the secret and the policy; cheap to clone.
#[derive(Clone)]
pub struct TokenService {
    secret: Arc<str>,
    policy: TokenPolicy,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Creates a token service
    ///
    /// The secret should be at least 32 bytes; the API config enforces this.
    pub fn new(secret: impl Into<String>, policy: TokenPolicy) -> Self {
        Self {
            secret: Arc::from(secret.into()),
            policy,
        }
    }

    /// Lifetimes in use
    pub fn policy(&self) -> &TokenPolicy {
        &self.policy
    }

    /// Issues a token using the policy lifetime for `purpose`
    pub fn issue(&self, subject: &str, purpose: TokenPurpose) -> Result<String, TokenError> {
        let ttl = self.policy.ttl_for(&purpose);
        self.issue_with_ttl(subject, purpose, ttl)
    }

    /// Issues a token with an explicit lifetime
    pub fn issue_with_ttl(
        &self,
        subject: &str,
        purpose: TokenPurpose,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let claims = Claims::with_expiration(subject, purpose, ttl)?;
        self.sign(&claims)
    }

    /// Signs already-built claims
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let header = Header::new(Algorithm::HS256);
        let key = EncodingKey::from_secret(self.secret.as_bytes());

        encode(&header, claims, &key)
            .map_err(|e| TokenError::Create(format!("Token encoding failed: {}", e)))
    }

    /// Validates signature, issuer, `nbf` and expiry, returning the claims
    ///
    /// The purpose is not checked here; callers match on it.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let key = DecodingKey::from_secret(self.secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(e.to_string()),
        })?;

        Ok(token_data.claims)
    }
}

/// SHA-256 hex digest of a token, the key it is stored under in the registry
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
