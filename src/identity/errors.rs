//! Provider error codes and their translation into [`AuthError`].
//!
//! This is the only place that knows provider-specific spellings. Swapping
//! the identity service means editing `CODE_TABLE`, nothing else.

use thiserror::Error;

use crate::auth::{AuthError, Operation};

/// Failure reported by (or while talking to) the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider answered with an error code
    #[error("identity provider rejected the request: {code}")]
    Rejected { code: String },

    /// The user backed out of a federated flow
    #[error("federated sign-in was cancelled: {reason}")]
    Cancelled { reason: String },

    /// Network failure or unparseable response
    #[error("identity provider unavailable: {0}")]
    Transport(String),
}

impl ProviderError {
    pub fn rejected(code: impl Into<String>) -> Self {
        Self::Rejected { code: code.into() }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.without_url().to_string())
    }
}

/// Provider codes, REST and JS SDK spellings side by side.
const CODE_TABLE: &[(&str, AuthError)] = &[
    ("EMAIL_EXISTS", AuthError::EmailInUse),
    ("auth/email-already-in-use", AuthError::EmailInUse),
    ("INVALID_LOGIN_CREDENTIALS", AuthError::InvalidCredentials),
    ("INVALID_PASSWORD", AuthError::InvalidCredentials),
    ("INVALID_EMAIL", AuthError::InvalidCredentials),
    ("auth/invalid-credential", AuthError::InvalidCredentials),
    ("auth/wrong-password", AuthError::InvalidCredentials),
    ("auth/invalid-email", AuthError::InvalidCredentials),
    ("EMAIL_NOT_FOUND", AuthError::UserNotFound),
    ("auth/user-not-found", AuthError::UserNotFound),
    ("WEAK_PASSWORD", AuthError::WeakPassword),
    ("auth/weak-password", AuthError::WeakPassword),
    ("USER_DISABLED", AuthError::AuthFailure),
    ("auth/user-disabled", AuthError::AuthFailure),
];

/// Firebase REST messages look like `WEAK_PASSWORD : Password should be ...`.
fn normalize_code(code: &str) -> &str {
    code.split([' ', ':']).next().unwrap_or(code).trim()
}

/// Map a provider failure onto the user-facing taxonomy.
///
/// Federated flows always surface as [`AuthError::FederatedAuthFailure`];
/// unknown codes fall back to [`AuthError::AuthFailure`].
pub fn translate(err: &ProviderError, operation: Operation) -> AuthError {
    if operation == Operation::Federated {
        return AuthError::FederatedAuthFailure;
    }

    match err {
        ProviderError::Rejected { code } => {
            let code = normalize_code(code);
            CODE_TABLE
                .iter()
                .find(|(known, _)| *known == code)
                .map(|(_, mapped)| *mapped)
                .unwrap_or(AuthError::AuthFailure)
        }
        ProviderError::Cancelled { .. } | ProviderError::Transport(_) => AuthError::AuthFailure,
    }
}
