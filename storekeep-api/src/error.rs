/// Response envelope and error mapping
///
/// Every endpoint answers with the same JSON shape:
///
/// ```json
/// { "error": { "<field>": "message" | null, ... }, "success": { "<field>": value | null, ... } }
/// ```
///
/// Each endpoint has a fixed set of error and success keys (its [`Shape`]),
/// all present and `null` unless set. Status codes are 200 on success, 400
/// for anything the caller can fix and 500 for server failures, whose cause
/// is logged and never returned.
///
/// # Example
///
/// ```
/// use storekeep_api::error::{ApiError, Shape};
///
/// let ok = Shape::SIGNUP.ok().with("message", "A link has been sent.");
/// let rejected = Shape::SIGNUP.reject(ApiError::MissingBody);
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use storekeep_shared::accounts::{AccountError, ErrorKind, Field};
use storekeep_shared::auth::gate::GateError;

/// Handler return type: both arms render as an envelope
pub type Reply = Result<Envelope, Envelope>;

pub const WEAK_PASSWORD: &str = "Weak password. Password must be at least 8 characters long containing lowercase, uppercase, numeric and special characters.";
pub const SERVER_ERROR: &str = "Unexpected error occurred.";
pub const MISSING_BODY: &str = "Invalid request. Body missing.";

/// Keys an endpoint reports
#[derive(Debug, Clone, Copy)]
pub struct Shape {
    error: &'static [&'static str],
    success: &'static [&'static str],
}

impl Shape {
    pub const SIGNUP: Shape = Shape {
        error: &["name", "email", "password", "server", "message"],
        success: &["message"],
    };

    pub const LOGIN: Shape = Shape {
        error: &["email", "password", "server", "message"],
        success: &["token", "verified", "message"],
    };

    pub const VERIFY: Shape = Shape {
        error: &["token", "server", "message"],
        success: &["token", "message"],
    };

    pub const REQUEST_PASSWORD_RESET: Shape = Shape {
        error: &["email", "server", "message"],
        success: &["message"],
    };

    pub const RESET_PASSWORD: Shape = Shape {
        error: &["token", "password", "server", "message"],
        success: &["token", "message"],
    };

    pub const CHANGE_PASSWORD: Shape = Shape {
        error: &["oldPassword", "newPassword", "server", "message"],
        success: &["message"],
    };

    pub const DELETE_ACCOUNT: Shape = Shape {
        error: &["server", "message"],
        success: &["message"],
    };

    /// Authentication gate rejections
    pub const GATE: Shape = Shape {
        error: &["token", "server", "message"],
        success: &[],
    };

    /// A 200 envelope with every key `null`
    pub fn ok(self) -> Envelope {
        Envelope {
            status: StatusCode::OK,
            error: nulls(self.error),
            success: nulls(self.success),
        }
    }

    /// An error envelope for `err`
    pub fn reject(self, err: impl Into<ApiError>) -> Envelope {
        let err = err.into();
        let mut envelope = self.ok();

        match err {
            ApiError::MissingBody => {
                envelope.status = StatusCode::BAD_REQUEST;
                envelope.set_error("message", MISSING_BODY);
            }
            ApiError::BadRequest { field, message } => {
                envelope.status = StatusCode::BAD_REQUEST;
                envelope.set_error(field, message);
            }
            ApiError::InternalError(cause) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", cause);
                envelope.status = StatusCode::INTERNAL_SERVER_ERROR;
                envelope.set_error("server", SERVER_ERROR);
            }
        }

        envelope
    }
}

fn nulls(keys: &[&str]) -> Map<String, Value> {
    keys.iter().map(|k| (k.to_string(), Value::Null)).collect()
}

/// A rendered response
#[derive(Debug, Serialize)]
pub struct Envelope {
    #[serde(skip)]
    status: StatusCode,
    error: Map<String, Value>,
    success: Map<String, Value>,
}

impl Envelope {
    /// Sets a success key
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.success.insert(key.to_string(), value.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn set_error(&mut self, key: &str, message: impl Into<String>) {
        self.error.insert(key.to_string(), Value::String(message.into()));
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// API error type
#[derive(Debug)]
pub enum ApiError {
    /// Body absent or not a JSON object (400)
    MissingBody,

    /// Caller error on one field (400)
    BadRequest { field: &'static str, message: String },

    /// Internal server error (500)
    InternalError(String),
}

impl ApiError {
    fn field(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::MissingBody => write!(f, "Bad request: body missing"),
            ApiError::BadRequest { field, message } => write!(f, "Bad request ({}): {}", field, message),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

/// Convert lifecycle errors to API errors
impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        if err.kind() == ErrorKind::Server {
            return ApiError::InternalError(err.to_string());
        }

        match err {
            AccountError::EmptyField(field) => ApiError::field(field.as_str(), empty_field_message(field)),
            AccountError::InvalidEmailFormat => ApiError::field("email", "Invalid email format."),
            AccountError::WeakPassword(field) => ApiError::field(field.as_str(), WEAK_PASSWORD),
            AccountError::EmailAlreadyRegistered => ApiError::field(
                "email",
                "This email is already registered. Please login or use new email address.",
            ),
            AccountError::UnregisteredEmail => {
                ApiError::field("email", "This email not registered. Please signup instead.")
            }
            AccountError::IncorrectPassword => {
                ApiError::field("password", "This password is not correct. Please try again.")
            }
            AccountError::InvalidOrExpiredToken => ApiError::field(
                "token",
                "The token is either invalid or expired. Please request again.",
            ),
            AccountError::IncorrectOldPassword => ApiError::field("oldPassword", "Password is incorrect."),
            AccountError::PasswordUnchanged => {
                ApiError::field("message", "New password cannot be same as old password.")
            }
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

fn empty_field_message(field: Field) -> &'static str {
    match field {
        Field::Name => "Name field cannot be empty.",
        Field::Email => "Email field cannot be empty.",
        Field::Password => "Password field cannot be empty.",
        Field::Token => "Token passed is invalid.",
        Field::OldPassword => "Old password field missing.",
        Field::NewPassword => "New password field missing.",
    }
}

/// Convert gate errors to API errors
impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::MissingToken => ApiError::field("token", "Token field missing."),
            GateError::Unauthorized => ApiError::field("token", "Unauthorized."),
            GateError::UnknownAccount => ApiError::field("message", "This user is not registered."),
            GateError::NotVerified => ApiError::field("message", "Account not verified."),
            GateError::Store(e) => ApiError::InternalError(format!("Store error: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storekeep_shared::mail::MailError;

    fn body(envelope: &Envelope) -> Value {
        serde_json::to_value(envelope).unwrap()
    }

    #[test]
    fn test_ok_envelope_has_all_keys() {
        let envelope = Shape::LOGIN.ok().with("token", "abc").with("verified", true);
        let json = body(&envelope);

        assert_eq!(envelope.status(), StatusCode::OK);
        assert_eq!(json["success"]["token"], "abc");
        assert_eq!(json["success"]["verified"], true);
        assert!(json["success"]["message"].is_null());
        assert!(json["error"]["email"].is_null());
        assert!(json["error"].as_object().unwrap().contains_key("server"));
    }

    #[test]
    fn test_field_errors_are_bad_requests() {
        let envelope = Shape::SIGNUP.reject(AccountError::EmailAlreadyRegistered);
        let json = body(&envelope);

        assert_eq!(envelope.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json["error"]["email"],
            "This email is already registered. Please login or use new email address."
        );
        assert!(json["success"]["message"].is_null());
    }

    #[test]
    fn test_server_errors_hide_cause() {
        let envelope = Shape::SIGNUP.reject(AccountError::Mail(MailError::Rejected("smtp down".into())));
        let json = body(&envelope);

        assert_eq!(envelope.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"]["server"], SERVER_ERROR);
        assert!(!json.to_string().contains("smtp down"));
    }

    #[test]
    fn test_missing_body() {
        let json = body(&Shape::VERIFY.reject(ApiError::MissingBody));
        assert_eq!(json["error"]["message"], MISSING_BODY);
    }

    #[test]
    fn test_gate_errors() {
        let cases = [
            (GateError::MissingToken, "token", "Token field missing."),
            (GateError::Unauthorized, "token", "Unauthorized."),
            (GateError::UnknownAccount, "message", "This user is not registered."),
            (GateError::NotVerified, "message", "Account not verified."),
        ];

        for (err, key, message) in cases {
            let envelope = Shape::GATE.reject(err);
            assert_eq!(envelope.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body(&envelope)["error"][key], message);
        }
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::field("email", "Invalid email format.");
        assert_eq!(err.to_string(), "Bad request (email): Invalid email format.");
    }
}
