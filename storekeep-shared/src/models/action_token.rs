/// Single-use token registry
///
/// Verification and reset tokens are recorded here when issued and deleted
/// when redeemed. Expired rows of a user are pruned whenever a new one is
/// recorded for them. A token is only honoured while its row exists, which lets
/// the server revoke it before the JWT expiry.
///
/// Only the SHA-256 digest of the token is stored.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE action_tokens (
///     token_hash CHAR(64) PRIMARY KEY,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     purpose TEXT NOT NULL CHECK (purpose IN ('verify', 'password-reset')),
///     expires_at TIMESTAMPTZ NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::auth::token::ActionPurpose;

/// A registry row to insert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewActionToken {
    /// Digest from [`crate::auth::token::token_digest`]
    pub token_hash: String,

    /// Owner of the token
    pub user_id: Uuid,

    /// What redeeming the token does
    pub purpose: ActionPurpose,

    /// Same instant as the JWT `exp`
    pub expires_at: DateTime<Utc>,
}

/// Registry operations
pub struct ActionToken;

impl ActionToken {
    /// Records an issued token
    pub async fn create<'e, E: PgExecutor<'e>>(executor: E, data: NewActionToken) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO action_tokens (token_hash, user_id, purpose, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(data.token_hash)
        .bind(data.user_id)
        .bind(data.purpose.as_str())
        .bind(data.expires_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Deletes the expired rows owned by `user_id`, returning how many went
    pub async fn purge_expired<'e, E: PgExecutor<'e>>(executor: E, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM action_tokens
            WHERE user_id = $1 AND expires_at <= NOW()
            "#,
        )
        .bind(user_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Deletes the matching, unexpired row owned by `email`
    ///
    /// Returns the owner's id if a row was deleted. Under concurrent calls
    /// with the same digest only one caller sees `Some`.
    pub async fn consume<'e, E: PgExecutor<'e>>(
        executor: E,
        token_hash: &str,
        purpose: ActionPurpose,
        email: &str,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            DELETE FROM action_tokens t
            USING users u
            WHERE t.token_hash = $1
              AND t.purpose = $2
              AND t.expires_at > NOW()
              AND t.user_id = u.id
              AND u.email = $3
            RETURNING t.user_id
            "#,
        )
        .bind(token_hash)
        .bind(purpose.as_str())
        .bind(email)
        .fetch_optional(executor)
        .await
    }
}
