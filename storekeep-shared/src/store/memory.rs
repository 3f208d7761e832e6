/// In-memory credential store
///
/// Keeps users and registry rows in maps behind one async mutex, which gives
/// the same all-or-nothing redemption the PostgreSQL store gets from a
/// transaction. Used by tests and for running the API without a database.
///
/// # Example
///
/// ```
/// use storekeep_shared::store::{CredentialStore, MemoryCredentialStore};
/// use storekeep_shared::models::user::CreateUser;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryCredentialStore::new();
/// store.insert_user(CreateUser {
///     email: "ada@example.com".into(),
///     name: "Ada".into(),
///     password_hash: "hash".into(),
/// }).await?;
///
/// assert!(store.find_user("ada@example.com").await?.is_some());
/// # Ok(())
/// # }
/// ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CredentialStore, StoreError, StoreResult};
use crate::auth::token::ActionPurpose;
use crate::models::action_token::NewActionToken;
use crate::models::user::{CreateUser, User};

#[derive(Default)]
struct State {
    /// Keyed by email
    users: HashMap<String, User>,

    /// Keyed by token digest
    tokens: HashMap<String, NewActionToken>,
}

/// Credential store held in process memory
#[derive(Default)]
pub struct MemoryCredentialStore {
    state: Mutex<State>,
    offline: AtomicBool,
}

impl MemoryCredentialStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with [`StoreError::Unavailable`]
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of outstanding registry rows
    pub async fn action_token_count(&self) -> usize {
        self.state.lock().await.tokens.len()
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }

    async fn consume(
        &self,
        token_hash: &str,
        purpose: ActionPurpose,
        email: &str,
        password_hash: Option<&str>,
    ) -> StoreResult<Option<User>> {
        self.check_online()?;
        let mut state = self.state.lock().await;

        let Some(user_id) = state.users.get(email).map(|u| u.id) else {
            return Ok(None);
        };

        let redeemable = state.tokens.get(token_hash).is_some_and(|row| {
            row.purpose == purpose && row.user_id == user_id && row.expires_at > Utc::now()
        });
        if !redeemable {
            return Ok(None);
        }
        state.tokens.remove(token_hash);

        let Some(user) = state.users.get_mut(email) else {
            return Ok(None);
        };
        match password_hash {
            Some(hash) => user.password_hash = hash.to_string(),
            None => user.verified = true,
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_user(&self, email: &str) -> StoreResult<Option<User>> {
        self.check_online()?;
        Ok(self.state.lock().await.users.get(email).cloned())
    }

    async fn insert_user(&self, user: CreateUser) -> StoreResult<User> {
        self.check_online()?;
        let mut state = self.state.lock().await;

        if state.users.contains_key(&user.email) {
            return Err(StoreError::DuplicateEmail);
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            verified: false,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(created.email.clone(), created.clone());

        Ok(created)
    }

    async fn update_password(&self, email: &str, password_hash: &str) -> StoreResult<bool> {
        self.check_online()?;
        let mut state = self.state.lock().await;

        Ok(match state.users.get_mut(email) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn delete_user(&self, email: &str) -> StoreResult<bool> {
        self.check_online()?;
        let mut state = self.state.lock().await;

        let Some(user) = state.users.remove(email) else {
            return Ok(false);
        };
        state.tokens.retain(|_, row| row.user_id != user.id);

        Ok(true)
    }

    async fn insert_action_token(&self, token: NewActionToken) -> StoreResult<()> {
        self.check_online()?;
        let mut state = self.state.lock().await;

        let now = Utc::now();
        state
            .tokens
            .retain(|_, row| row.user_id != token.user_id || row.expires_at > now);
        state.tokens.insert(token.token_hash.clone(), token);

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
        self.check_online()
    }
}
