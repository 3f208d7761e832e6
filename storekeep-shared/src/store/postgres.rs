/// PostgreSQL credential store
///
/// # Example
///
/// ```no_run
/// use storekeep_shared::db::pool::{create_pool, DatabaseConfig};
/// use storekeep_shared::store::{CredentialStore, PgCredentialStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig {
///     url: std::env::var("DATABASE_URL")?,
///     ..Default::default()
/// })
/// .await?;
///
/// let store = PgCredentialStore::new(pool);
/// let user = store.find_user("ada@example.com").await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use super::{CredentialStore, StoreError, StoreResult};
use crate::auth::token::ActionPurpose;
use crate::db::pool::health_check;
use crate::models::action_token::{ActionToken, NewActionToken};
use crate::models::user::{CreateUser, User};

/// Credential store backed by a connection pool
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    /// Wraps an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn consume(
        &self,
        token_hash: &str,
        purpose: ActionPurpose,
        email: &str,
        password_hash: Option<&str>,
    ) -> StoreResult<Option<User>> {
        let mut tx = self.pool.begin().await?;

        let Some(user_id) = ActionToken::consume(&mut *tx, token_hash, purpose, email).await? else {
            debug!(purpose = purpose.as_str(), "No redeemable registry row");
            tx.rollback().await?;
            return Ok(None);
        };

        let user = match password_hash {
            Some(hash) => User::set_password(&mut *tx, user_id, hash).await?,
            None => User::mark_verified(&mut *tx, user_id).await?,
        };

        tx.commit().await?;
        Ok(user)
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_user(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn insert_user(&self, user: CreateUser) -> StoreResult<User> {
        User::create(&self.pool, user).await.map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::DuplicateEmail,
            other => StoreError::Database(other),
        })
    }

    async fn update_password(&self, email: &str, password_hash: &str) -> StoreResult<bool> {
        Ok(User::set_password_by_email(&self.pool, email, password_hash).await?)
    }

    async fn delete_user(&self, email: &str) -> StoreResult<bool> {
        Ok(User::delete_by_email(&self.pool, email).await?)
    }

    async fn insert_action_token(&self, token: NewActionToken) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let purged = ActionToken::purge_expired(&mut *tx, token.user_id).await?;
        if purged > 0 {
            debug!(purged, "Pruned expired registry rows");
        }
        ActionToken::create(&mut *tx, token).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn redeem_verification(&self, token_hash: &str, email: &str) -> StoreResult<Option<User>> {
        self.consume(token_hash, ActionPurpose::EmailVerification, email, None)
            .await
    }

    async fn redeem_password_reset(
        &self,
        token_hash: &str,
        email: &str,
        password_hash: &str,
    ) -> StoreResult<Option<User>> {
        self.consume(token_hash, ActionPurpose::PasswordReset, email, Some(password_hash))
            .await
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(health_check(&self.pool).await?)
    }
}
