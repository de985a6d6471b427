//! Identity provider port
//!
//! The application never authenticates anyone itself. Every sign-in, sign-up
//! and federated sign-in is delegated to an external identity service through
//! [`IdentityProvider`]; the Firebase Identity Toolkit adapter is the
//! production implementation.

mod errors;
mod firebase;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use errors::{ProviderError, translate};
pub use firebase::FirebaseIdentityProvider;

/// How the user proved their identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignInMethod {
    Password,
    Google,
}

/// Identity record owned by the external service
///
/// The application holds it only for the duration of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub method: SignInMethod,
}

/// Opaque session credential issued by the identity provider.
///
/// Never parsed or verified locally; `Debug` redacts the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    expires_in: Option<i64>,
}

impl Credential {
    pub fn new(token: impl Into<String>, expires_in: Option<i64>) -> Self {
        Self {
            token: token.into(),
            expires_in,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Lifetime in seconds, when the provider reported one
    pub fn expires_in(&self) -> Option<i64> {
        self.expires_in
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Successful authentication as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub user: User,
    pub credential: Credential,
}

/// Authorization code returned by Google's consent screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleAuthorization {
    pub code: String,
    pub redirect_uri: String,
}

/// Contract of the external identity service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Email/password sign-in.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthGrant, ProviderError>;

    /// Create an email/password account and sign it in.
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthGrant, ProviderError>;

    /// Complete a Google sign-in from an authorization code.
    async fn sign_in_with_google(
        &self,
        authorization: &GoogleAuthorization,
    ) -> Result<AuthGrant, ProviderError>;

    /// Resolve the user behind a credential.
    async fn lookup(&self, credential: &Credential) -> Result<User, ProviderError>;
}
