//! User-facing authentication failures

use axum::http::StatusCode;
use thiserror::Error;

use super::session::Notice;

/// Why an authentication attempt failed.
///
/// The display string is the humanized message shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Please fill in all fields")]
    MissingFields,

    #[error("Password must be at least 6 characters")]
    WeakPassword,

    #[error("Email already in use")]
    EmailInUse,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("No account found for that email")]
    UserNotFound,

    #[error("Failed to sign in with Google")]
    FederatedAuthFailure,

    #[error("Authentication failed. Please try again.")]
    AuthFailure,

    /// Another attempt is still waiting on the provider
    #[error("Authentication already in progress")]
    Busy,
}

impl AuthError {
    /// Stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingFields => "missing_fields",
            AuthError::WeakPassword => "weak_password",
            AuthError::EmailInUse => "email_in_use",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::UserNotFound => "user_not_found",
            AuthError::FederatedAuthFailure => "federated_auth_failure",
            AuthError::AuthFailure => "auth_failure",
            AuthError::Busy => "busy",
        }
    }

    /// Status used when the login page is re-rendered with this error
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingFields | AuthError::WeakPassword => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
            AuthError::FederatedAuthFailure => StatusCode::UNAUTHORIZED,
            AuthError::EmailInUse | AuthError::Busy => StatusCode::CONFLICT,
            AuthError::AuthFailure => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn notice(&self) -> Notice {
        Notice::error(self.to_string())
    }
}
