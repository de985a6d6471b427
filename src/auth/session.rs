//! Auth session controller
//!
//! Holds the authentication state machine for one client:
//!
//! ```text
//! Unauthenticated ──invoke──▶ Authenticating ──ok──▶ Authenticated
//!        ▲                          │                      │
//!        └──────────failure─────────┘◀──────sign_out───────┘
//! ```
//!
//! The controller never navigates. Every operation returns either an
//! [`AuthOutcome`] or an [`AuthError`]; the caller turns that into a redirect
//! or a re-rendered form.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use super::error::AuthError;
use crate::identity::{
    AuthGrant, Credential, GoogleAuthorization, IdentityProvider, ProviderError, User, translate,
};
use crate::metrics::AUTH_ATTEMPTS_TOTAL;

/// Minimum password length accepted for new accounts
pub const MIN_PASSWORD_LEN: usize = 6;

/// Current position in the authentication state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated(User),
}

/// Which controller operation is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SignIn,
    SignUp,
    Federated,
}

impl Operation {
    pub fn label(&self) -> &'static str {
        match self {
            Operation::SignIn => "sign_in",
            Operation::SignUp => "sign_up",
            Operation::Federated => "federated_sign_in",
        }
    }

    fn success_message(&self) -> &'static str {
        match self {
            Operation::SignIn => "Welcome back!",
            Operation::SignUp => "Account created successfully!",
            Operation::Federated => "Signed in with Google!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// User-visible notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Result of the Google consent screen as seen by the callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FederatedFlow {
    /// The user granted access
    Completed(GoogleAuthorization),
    /// The user backed out, or Google reported an error
    Cancelled { reason: String },
}

/// Successful authentication
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub user: User,
    pub credential: Credential,
    pub notice: Notice,
}

/// Releases the in-flight flag when an attempt finishes, however it finishes.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Authentication state holder for one client
pub struct AuthSession {
    provider: Arc<dyn IdentityProvider>,
    state: RwLock<AuthState>,
    in_flight: AtomicBool,
}

impl AuthSession {
    /// Create an unauthenticated session bound to a provider
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            state: RwLock::new(AuthState::Unauthenticated),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Snapshot of the current state
    pub async fn state(&self) -> AuthState {
        self.state.read().await.clone()
    }

    /// The signed-in user, if any
    pub async fn current_user(&self) -> Option<User> {
        match &*self.state.read().await {
            AuthState::Authenticated(user) => Some(user.clone()),
            _ => None,
        }
    }

    /// True while an attempt is waiting on the provider.
    ///
    /// The login page renders its submit buttons disabled while this is set.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Email/password sign-in
    ///
    /// # Errors
    /// `MissingFields` without contacting the provider when either field is
    /// empty; otherwise whatever the provider's answer translates to.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthOutcome, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(self.reject_locally(Operation::SignIn, AuthError::MissingFields));
        }

        let _guard = self.begin(Operation::SignIn).await?;
        let result = self.provider.sign_in(email, password).await;
        self.finish(Operation::SignIn, result).await
    }

    /// Create an account and sign it in
    ///
    /// # Errors
    /// `MissingFields` or `WeakPassword` without contacting the provider;
    /// otherwise whatever the provider's answer translates to.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthOutcome, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(self.reject_locally(Operation::SignUp, AuthError::MissingFields));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(self.reject_locally(Operation::SignUp, AuthError::WeakPassword));
        }

        let _guard = self.begin(Operation::SignUp).await?;
        let result = self.provider.sign_up(email, password).await;
        self.finish(Operation::SignUp, result).await
    }

    /// Finish a Google sign-in
    ///
    /// No local validation. A cancelled flow still passes through
    /// `Authenticating` and fails with `FederatedAuthFailure`.
    pub async fn federated_sign_in(&self, flow: FederatedFlow) -> Result<AuthOutcome, AuthError> {
        let _guard = self.begin(Operation::Federated).await?;
        let result = match flow {
            FederatedFlow::Completed(authorization) => {
                self.provider.sign_in_with_google(&authorization).await
            }
            FederatedFlow::Cancelled { reason } => Err(ProviderError::Cancelled { reason }),
        };
        self.finish(Operation::Federated, result).await
    }

    /// Drop the current user
    pub async fn sign_out(&self) {
        let mut state = self.state.write().await;
        if let AuthState::Authenticated(user) = &*state {
            tracing::info!(uid = %user.uid, "Signed out");
        }
        *state = AuthState::Unauthenticated;
    }

    fn reject_locally(&self, operation: Operation, error: AuthError) -> AuthError {
        tracing::debug!(
            operation = operation.label(),
            reason = error.kind(),
            "Rejected before contacting identity provider"
        );
        AUTH_ATTEMPTS_TOTAL
            .with_label_values(&[operation.label(), error.kind()])
            .inc();
        error
    }

    async fn begin(&self, operation: Operation) -> Result<InFlight<'_>, AuthError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(
                operation = operation.label(),
                "Authentication attempt ignored; another is in progress"
            );
            return Err(AuthError::Busy);
        }

        let guard = InFlight(&self.in_flight);
        *self.state.write().await = AuthState::Authenticating;
        Ok(guard)
    }

    async fn finish(
        &self,
        operation: Operation,
        result: Result<AuthGrant, ProviderError>,
    ) -> Result<AuthOutcome, AuthError> {
        let mut state = self.state.write().await;

        match result {
            Ok(grant) => {
                *state = AuthState::Authenticated(grant.user.clone());
                tracing::info!(
                    operation = operation.label(),
                    uid = %grant.user.uid,
                    "Authenticated"
                );
                AUTH_ATTEMPTS_TOTAL
                    .with_label_values(&[operation.label(), "success"])
                    .inc();

                Ok(AuthOutcome {
                    user: grant.user,
                    credential: grant.credential,
                    notice: Notice::success(operation.success_message()),
                })
            }
            Err(provider_error) => {
                *state = AuthState::Unauthenticated;
                let error = translate(&provider_error, operation);
                tracing::warn!(
                    operation = operation.label(),
                    reason = error.kind(),
                    error = %provider_error,
                    "Authentication failed"
                );
                AUTH_ATTEMPTS_TOTAL
                    .with_label_values(&[operation.label(), error.kind()])
                    .inc();
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{MockIdentityProvider, SignInMethod};

    fn grant(email: &str, method: SignInMethod) -> AuthGrant {
        AuthGrant {
            user: User {
                uid: "uid-1".to_string(),
                email: Some(email.to_string()),
                display_name: None,
                method,
            },
            credential: Credential::new("id-token", Some(3600)),
        }
    }

    fn session(mock: MockIdentityProvider) -> AuthSession {
        AuthSession::new(Arc::new(mock))
    }

    #[tokio::test]
    async fn sign_in_success_authenticates() {
        let mut mock = MockIdentityProvider::new();
        mock.expect_sign_in()
            .withf(|email, password| email == "a@b.com" && password == "hunter22")
            .times(1)
            .returning(|email, _| Ok(grant(email, SignInMethod::Password)));

        let session = session(mock);
        let outcome = session.sign_in(" a@b.com ", "hunter22").await.unwrap();

        assert_eq!(outcome.notice, Notice::success("Welcome back!"));
        assert_eq!(outcome.credential.token(), "id-token");
        assert_eq!(
            session.state().await,
            AuthState::Authenticated(outcome.user.clone())
        );
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn sign_in_with_empty_fields_never_calls_provider() {
        let mut mock = MockIdentityProvider::new();
        mock.expect_sign_in().never();
        let session = session(mock);

        assert_eq!(
            session.sign_in("", "password").await.unwrap_err(),
            AuthError::MissingFields
        );
        assert_eq!(
            session.sign_in("a@b.com", "").await.unwrap_err(),
            AuthError::MissingFields
        );
        assert_eq!(
            session.sign_in("   ", "password").await.unwrap_err(),
            AuthError::MissingFields
        );
        assert_eq!(session.state().await, AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn sign_in_short_password_still_reaches_provider() {
        let mut mock = MockIdentityProvider::new();
        mock.expect_sign_in()
            .times(1)
            .returning(|_, _| Err(ProviderError::rejected("INVALID_LOGIN_CREDENTIALS")));

        let session = session(mock);
        assert_eq!(
            session.sign_in("a@b.com", "123").await.unwrap_err(),
            AuthError::InvalidCredentials
        );
    }

    #[tokio::test]
    async fn sign_in_failures_are_translated() {
        let mut mock = MockIdentityProvider::new();
        mock.expect_sign_in()
            .times(1)
            .returning(|_, _| Err(ProviderError::rejected("EMAIL_NOT_FOUND")));

        let session = session(mock);
        assert_eq!(
            session.sign_in("ghost@b.com", "password").await.unwrap_err(),
            AuthError::UserNotFound
        );
        assert_eq!(session.state().await, AuthState::Unauthenticated);
        assert_eq!(session.current_user().await, None);
    }

    #[tokio::test]
    async fn sign_up_weak_password_never_calls_provider() {
        let mut mock = MockIdentityProvider::new();
        mock.expect_sign_up().never();
        let session = session(mock);

        let error = session.sign_up("a@b.com", "12345").await.unwrap_err();
        assert_eq!(error, AuthError::WeakPassword);
        assert_eq!(session.state().await, AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn sign_up_empty_fields_never_calls_provider() {
        let mut mock = MockIdentityProvider::new();
        mock.expect_sign_up().never();
        let session = session(mock);

        assert_eq!(
            session.sign_up("", "").await.unwrap_err(),
            AuthError::MissingFields
        );
    }

    #[tokio::test]
    async fn sign_up_email_in_use() {
        let mut mock = MockIdentityProvider::new();
        mock.expect_sign_up()
            .times(1)
            .returning(|_, _| Err(ProviderError::rejected("EMAIL_EXISTS")));

        let session = session(mock);
        assert_eq!(
            session.sign_up("a@b.com", "123456").await.unwrap_err(),
            AuthError::EmailInUse
        );
    }

    #[tokio::test]
    async fn sign_up_success_reports_account_created() {
        let mut mock = MockIdentityProvider::new();
        mock.expect_sign_up()
            .times(1)
            .returning(|email, _| Ok(grant(email, SignInMethod::Password)));

        let session = session(mock);
        let outcome = session.sign_up("a@b.com", "123456").await.unwrap();
        assert_eq!(outcome.notice.message, "Account created successfully!");
        assert_eq!(
            session.current_user().await.and_then(|u| u.email),
            Some("a@b.com".to_string())
        );
    }

    #[tokio::test]
    async fn federated_sign_in_success() {
        let mut mock = MockIdentityProvider::new();
        mock.expect_sign_in_with_google()
            .withf(|authorization| authorization.code == "auth-code")
            .times(1)
            .returning(|_| Ok(grant("g@b.com", SignInMethod::Google)));

        let session = session(mock);
        let outcome = session
            .federated_sign_in(FederatedFlow::Completed(GoogleAuthorization {
                code: "auth-code".to_string(),
                redirect_uri: "http://localhost:3000/auth/google/callback".to_string(),
            }))
            .await
            .unwrap();

        assert_eq!(outcome.user.method, SignInMethod::Google);
        assert_eq!(outcome.notice.message, "Signed in with Google!");
    }

    #[tokio::test]
    async fn federated_cancel_fails_without_provider() {
        let mut mock = MockIdentityProvider::new();
        mock.expect_sign_in_with_google().never();
        let session = session(mock);

        let error = session
            .federated_sign_in(FederatedFlow::Cancelled {
                reason: "access_denied".to_string(),
            })
            .await
            .unwrap_err();

        assert_eq!(error, AuthError::FederatedAuthFailure);
        assert_eq!(session.state().await, AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn federated_provider_errors_are_federated_failures() {
        let mut mock = MockIdentityProvider::new();
        mock.expect_sign_in_with_google()
            .times(1)
            .returning(|_| Err(ProviderError::Transport("timeout".to_string())));

        let session = session(mock);
        let error = session
            .federated_sign_in(FederatedFlow::Completed(GoogleAuthorization {
                code: "auth-code".to_string(),
                redirect_uri: "http://localhost/cb".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(error, AuthError::FederatedAuthFailure);
    }

    #[tokio::test]
    async fn concurrent_attempt_is_rejected_as_busy() {
        let mut mock = MockIdentityProvider::new();
        mock.expect_sign_in().never();
        let session = session(mock);

        session.in_flight.store(true, Ordering::Release);
        assert_eq!(
            session.sign_in("a@b.com", "password").await.unwrap_err(),
            AuthError::Busy
        );
        assert!(session.is_busy());
    }

    #[tokio::test]
    async fn sign_out_returns_to_unauthenticated() {
        let mut mock = MockIdentityProvider::new();
        mock.expect_sign_in()
            .returning(|email, _| Ok(grant(email, SignInMethod::Password)));

        let session = session(mock);
        session.sign_in("a@b.com", "password").await.unwrap();
        session.sign_out().await;

        assert_eq!(session.state().await, AuthState::Unauthenticated);
        assert_eq!(session.current_user().await, None);
    }
}
