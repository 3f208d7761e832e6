/// Account endpoints
///
/// # Endpoints
///
/// - `POST /signup` - Register and receive a verification link
/// - `GET|POST /login` - Sign in, or get a fresh verification link
/// - `POST /verify` - Redeem a verification link
/// - `POST /requestPasswordReset` - Receive a reset link
/// - `PUT /resetPassword` - Redeem a reset link
/// - `PUT /changePassword` - Change password (authenticated)
/// - `DELETE /users/delete` - Delete account (authenticated)
///
/// Bodies are JSON with camelCase keys. A body that is missing or not JSON is
/// answered with `error.message = "Invalid request. Body missing."`.

use crate::{
    app::AppState,
    error::{ApiError, Reply, Shape},
};
use axum::{extract::rejection::JsonRejection, extract::State, Extension, Json};
use serde::Deserialize;
use storekeep_shared::{accounts::LoginOutcome, auth::gate::AuthenticatedUser};

/// Signup request
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Verification request
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: Option<String>,
}

/// Password reset request
#[derive(Debug, Deserialize)]
pub struct RequestPasswordResetRequest {
    pub email: Option<String>,
}

/// Reset password request
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: Option<String>,
    pub password: Option<String>,
}

/// Change password request; `token` is consumed by the auth layer
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

fn text(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or_default()
}

fn body<T>(shape: Shape, payload: Result<Json<T>, JsonRejection>) -> Result<T, crate::error::Envelope> {
    payload
        .map(|Json(input)| input)
        .map_err(|_| shape.reject(ApiError::MissingBody))
}

/// Register a new user
///
/// ```text
/// POST /signup
/// { "name": "Ada", "email": "ada@example.com", "password": "Str0ng!pass" }
/// ```
///
/// Response:
/// ```json
/// { "error": {...}, "success": { "message": "A link has been sent to ada@example.com. ..." } }
/// ```
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Reply {
    let shape = Shape::SIGNUP;
    let input = body(shape, payload)?;

    let email = state
        .accounts
        .signup(text(&input.name), text(&input.email), text(&input.password))
        .await
        .map_err(|e| shape.reject(e))?;

    Ok(shape.ok().with("message", verification_sent(&email)))
}

/// Login
///
/// Verified accounts get a session token. Unverified accounts get
/// `verified: false` and a new verification link by email.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Reply {
    let shape = Shape::LOGIN;
    let input = body(shape, payload)?;

    let outcome = state
        .accounts
        .login(text(&input.email), text(&input.password))
        .await
        .map_err(|e| shape.reject(e))?;

    Ok(match outcome {
        LoginOutcome::Authenticated(session) => shape
            .ok()
            .with("token", session.token)
            .with("verified", true)
            .with("message", format!("Successfully logged in as {}", session.name)),
        LoginOutcome::VerificationPending { email } => shape
            .ok()
            .with("verified", false)
            .with("message", verification_sent(&email)),
    })
}

/// Redeem an email verification token
pub async fn verify(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Reply {
    let shape = Shape::VERIFY;
    let input = body(shape, payload)?;

    let session = state
        .accounts
        .verify(text(&input.token))
        .await
        .map_err(|e| shape.reject(e))?;

    Ok(shape.ok().with("token", session.token).with(
        "message",
        format!("Account verified. Successfully logged in as {}", session.name),
    ))
}

/// Send a password reset link
pub async fn request_password_reset(
    State(state): State<AppState>,
    payload: Result<Json<RequestPasswordResetRequest>, JsonRejection>,
) -> Reply {
    let shape = Shape::REQUEST_PASSWORD_RESET;
    let input = body(shape, payload)?;

    let email = state
        .accounts
        .request_password_reset(text(&input.email))
        .await
        .map_err(|e| shape.reject(e))?;

    Ok(shape.ok().with(
        "message",
        format!(
            "A link has been sent to {}. Please click the link to reset your password.",
            email
        ),
    ))
}

/// Redeem a password reset token
pub async fn reset_password(
    State(state): State<AppState>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Reply {
    let shape = Shape::RESET_PASSWORD;
    let input = body(shape, payload)?;

    let session = state
        .accounts
        .reset_password(text(&input.token), text(&input.password))
        .await
        .map_err(|e| shape.reject(e))?;

    Ok(shape.ok().with("token", session.token).with(
        "message",
        format!("Password reset. Successfully logged in as {}", session.name),
    ))
}

/// Change the password of the authenticated user
pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Reply {
    let shape = Shape::CHANGE_PASSWORD;
    let input = body(shape, payload)?;

    state
        .accounts
        .change_password(&user, text(&input.old_password), text(&input.new_password))
        .await
        .map_err(|e| shape.reject(e))?;

    Ok(shape.ok().with("message", "Password changed successfully."))
}

/// Delete the authenticated user's account
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Reply {
    let shape = Shape::DELETE_ACCOUNT;

    state
        .accounts
        .delete_account(&user)
        .await
        .map_err(|e| shape.reject(e))?;

    Ok(shape.ok().with("message", "Account deleted."))
}

fn verification_sent(email: &str) -> String {
    format!(
        "A link has been sent to {}. Please click the link to verify your email.",
        email
    )
}
