/// Authentication gate
///
/// Turns a presented bearer token into the identity of a live, verified
/// account. The token alone is never trusted for the verified flag or the
/// password hash: the subject is looked up again on every call.
///
/// Order of checks:
///
/// 1. token present, otherwise [`GateError::MissingToken`]
/// 2. signature, issuer and expiry valid, otherwise [`GateError::Unauthorized`]
/// 3. purpose is `session`, otherwise [`GateError::Unauthorized`]
/// 4. subject still registered, otherwise [`GateError::UnknownAccount`]
/// 5. subject verified, otherwise [`GateError::NotVerified`]
///
/// # Example
///
/// ```
/// use storekeep_shared::auth::gate::{authenticate, GateError};
/// use storekeep_shared::auth::token::{TokenPolicy, TokenService};
/// use storekeep_shared::store::MemoryCredentialStore;
///
/// # async fn example() {
/// let tokens = TokenService::new("a-secret-that-is-at-least-32-bytes", TokenPolicy::default());
/// let store = MemoryCredentialStore::new();
///
/// let result = authenticate(&tokens, &store, None).await;
/// assert!(matches!(result, Err(GateError::MissingToken)));
/// # }
/// ```

use serde::Serialize;
use tracing::debug;

use super::token::{TokenPurpose, TokenService};
use crate::store::{CredentialStore, StoreError};
use crate::validation::is_blank;

/// Identity attached to a request after the gate passes
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub email: String,

    #[serde(skip_serializing)]
    pub password_hash: String,

    pub name: String,
}

/// Why the gate rejected a request
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Token missing")]
    MissingToken,

    /// Token failed verification or is not a session token
    #[error("Unauthorized")]
    Unauthorized,

    /// Token subject no longer exists
    #[error("Account not registered")]
    UnknownAccount,

    #[error("Account not verified")]
    NotVerified,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Runs the gate for one request
pub async fn authenticate(
    tokens: &TokenService,
    store: &dyn CredentialStore,
    token: Option<&str>,
) -> Result<AuthenticatedUser, GateError> {
    let token = match token {
        Some(token) if !is_blank(Some(token)) => token,
        _ => return Err(GateError::MissingToken),
    };

    let claims = tokens.verify(token).map_err(|e| {
        debug!(error = %e, "Bearer token rejected");
        GateError::Unauthorized
    })?;

    if !matches!(claims.purpose, TokenPurpose::Session { .. }) {
        debug!(email = %claims.sub, "Action token presented as bearer credential");
        return Err(GateError::Unauthorized);
    }

    let user = store
        .find_user(&claims.sub)
        .await?
        .ok_or(GateError::UnknownAccount)?;

    if !user.verified {
        return Err(GateError::NotVerified);
    }

    Ok(AuthenticatedUser {
        email: user.email,
        password_hash: user.password_hash,
        name: user.name,
    })
}
