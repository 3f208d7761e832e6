//! # Storekeep Shared Library
//!
//! Account management core used by the Storekeep API server.
//!
//! ## Module Organization
//!
//! - `accounts`: Account lifecycle workflows (signup, verification, password reset)
//! - `auth`: Token service, password hashing and the authentication gate
//! - `db`: Connection pool and embedded migrations
//! - `mail`: Outbound mail dispatch
//! - `models`: Database models
//! - `store`: Credential store trait and implementations
//! - `validation`: Email normalization and shape checks

pub mod accounts;
pub mod auth;
pub mod db;
pub mod mail;
pub mod models;
pub mod store;
pub mod validation;

/// Current version of the Storekeep shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
