/// Input normalization and shape checks for account fields

use validator::ValidateEmail;

/// Checks that `email` looks like `local@domain` with no embedded whitespace
///
/// # Example
///
/// ```
/// use storekeep_shared::validation::valid_email;
///
/// assert!(valid_email("a@b.com"));
/// assert!(!valid_email("not-an-email"));
/// ```
pub fn valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    email.to_string().validate_email()
}

/// Canonical form used for every lookup and insert
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// True for absent or whitespace-only input
pub fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}
