/// Database models for Storekeep
///
/// - `user`: accounts and their verified flag
/// - `action_token`: registry of outstanding verification and reset tokens

pub mod action_token;
pub mod user;
