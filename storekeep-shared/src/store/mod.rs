/// Credential Store
///
/// Persistence contract for accounts and the single-use token registry.
/// Account workflows only talk to this trait; two implementations exist:
///
/// - [`PgCredentialStore`]: PostgreSQL via sqlx, used by the server
/// - [`MemoryCredentialStore`]: in-process maps, used by tests and local runs
///
/// Redemption is a single operation per purpose: the registry row is deleted
/// and the user updated as one unit, so a token can never be replayed after
/// the change it authorized has been applied.

use async_trait::async_trait;

use crate::models::action_token::NewActionToken;
use crate::models::user::{CreateUser, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryCredentialStore;
pub use postgres::PgCredentialStore;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Email is already registered
    #[error("Email already registered")]
    DuplicateEmail,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Store could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Store result type alias
pub type StoreResult<T> = Result<T, StoreError>;

/// Accounts and token registry
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Looks up a user by normalized email
    async fn find_user(&self, email: &str) -> StoreResult<Option<User>>;

    /// Inserts an unverified user
    ///
    /// Fails with [`StoreError::DuplicateEmail`] if the email is taken.
    async fn insert_user(&self, user: CreateUser) -> StoreResult<User>;

    /// Replaces a password hash; false if the user does not exist
    async fn update_password(&self, email: &str, password_hash: &str) -> StoreResult<bool>;

    /// Removes a user and its outstanding action tokens; false if absent
    async fn delete_user(&self, email: &str) -> StoreResult<bool>;

    /// Records an issued verification or reset token
    async fn insert_action_token(&self, token: NewActionToken) -> StoreResult<()>;

    /// Consumes a verification token and marks its owner verified
    ///
    /// Returns the updated user, or `None` if no unexpired registry row with
    /// this digest belongs to `email`.
    async fn redeem_verification(&self, token_hash: &str, email: &str) -> StoreResult<Option<User>>;

    /// Consumes a reset token and stores the new password hash
    ///
    /// Same contract as [`CredentialStore::redeem_verification`].
    async fn redeem_password_reset(
        &self,
        token_hash: &str,
        email: &str,
        password_hash: &str,
    ) -> StoreResult<Option<User>>;

    /// Cheap connectivity check
    async fn ping(&self) -> StoreResult<()>;
}
