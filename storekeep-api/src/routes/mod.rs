/// API route handlers
///
/// - `health`: Health check endpoint
/// - `users`: Account lifecycle endpoints

pub mod health;
pub mod users;
