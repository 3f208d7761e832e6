/// Authentication primitives for Storekeep
///
/// # Modules
///
/// - [`token`]: HS256 tokens for sessions and single-use action links
/// - [`password`]: Argon2id password hashing and the strength policy
/// - [`gate`]: resolves a bearer token to a live, verified account
///
/// # Example
///
/// ```
/// use storekeep_shared::auth::password::{hash_password, verify_password};
/// use storekeep_shared::auth::token::{TokenPolicy, TokenPurpose, TokenService};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Str0ng!pass")?;
/// assert!(verify_password("Str0ng!pass", &hash)?);
///
/// let tokens = TokenService::new("a-secret-that-is-at-least-32-bytes", TokenPolicy::default());
/// let token = tokens.issue("ada@example.com", TokenPurpose::Session { name: "Ada".into() })?;
/// # Ok(())
/// # }
/// ```

pub mod gate;
pub mod password;
pub mod token;
