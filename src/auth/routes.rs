//! Login, Google sign-in and logout routes
//!
//! Handlers borrow the browser's [`AuthSession`](super::AuthSession) from the
//! registry and decide navigation from the outcome it returns.

use axum::{
    Form, Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use super::cookies;
use super::error::AuthError;
use super::guard::{LANDING_PATH, LOGIN_PATH};
use super::session::{AuthOutcome, FederatedFlow};
use crate::AppState;
use crate::error::AppError;
use crate::identity::GoogleAuthorization;
use crate::pages;

/// Create authentication router
///
/// Routes:
/// - GET /auth - Login page
/// - POST /auth/sign-in - Email/password sign-in
/// - POST /auth/sign-up - Account creation
/// - GET /auth/google - Redirect to Google
/// - GET /auth/google/callback - OAuth callback
/// - POST /logout - Logout
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route(LOGIN_PATH, get(login_page))
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/google", get(google_redirect))
        .route("/auth/google/callback", get(google_callback))
        .route("/logout", post(logout))
}

// =============================================================================
// Email / password
// =============================================================================

async fn login_page(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let busy = match cookies::existing_client_id(&jar) {
        Some(client) => state
            .sessions
            .get(&client)
            .await
            .is_some_and(|session| session.is_busy()),
        None => false,
    };
    let (jar, notice) = cookies::take_flash(&state.config, jar);
    (jar, pages::login_page(notice.as_ref(), "", busy))
}

#[derive(Debug, Deserialize)]
struct CredentialsForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

/// POST /auth/sign-in
async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let (jar, client) = cookies::client_id(&state.config, jar);
    let session = state.sessions.session(&client).await;
    let result = session.sign_in(&form.email, &form.password).await;
    complete(&state, jar, result, &form.email)
}

/// POST /auth/sign-up
async fn sign_up(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let (jar, client) = cookies::client_id(&state.config, jar);
    let session = state.sessions.session(&client).await;
    let result = session.sign_up(&form.email, &form.password).await;
    complete(&state, jar, result, &form.email)
}

/// Navigate on the controller's verdict.
///
/// Success stores the credential and goes to the landing page; failure
/// re-renders the login form with the humanized reason.
fn complete(
    state: &AppState,
    jar: CookieJar,
    result: Result<AuthOutcome, AuthError>,
    email: &str,
) -> Response {
    match result {
        Ok(outcome) => {
            let jar = jar
                .add(cookies::session_cookie(&state.config, &outcome.credential))
                .add(cookies::flash_cookie(&state.config, &outcome.notice));
            (jar, Redirect::to(LANDING_PATH)).into_response()
        }
        Err(error) => {
            let busy = error == AuthError::Busy;
            let page = pages::login_page(Some(&error.notice()), email.trim(), busy);
            (error.status(), jar, page).into_response()
        }
    }
}

// =============================================================================
// Google OAuth
// =============================================================================

/// GET /auth/google
///
/// # Steps
/// 1. Generate CSRF state token
/// 2. Store state in cookie
/// 3. Redirect to Google with client_id, redirect_uri, scope, state
async fn google_redirect(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let csrf_state = cookies::random_token();
    let location = google_authorize_url(&state, &csrf_state)?;

    let jar = jar.add(cookies::oauth_state_cookie(&state.config, csrf_state));
    Ok((jar, Redirect::to(location.as_str())))
}

fn google_authorize_url(state: &AppState, csrf_state: &str) -> Result<url::Url, AppError> {
    let google = &state.config.identity.google;
    let redirect_uri = state.config.google_redirect_uri();

    url::Url::parse_with_params(
        &google.auth_url,
        &[
            ("client_id", google.client_id.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", "openid email profile"),
            ("prompt", "select_account"),
            ("state", csrf_state),
        ],
    )
    .map_err(|e| AppError::Config(format!("identity.google.auth_url is invalid: {e}")))
}

/// Query parameters from Google callback
#[derive(Debug, Deserialize)]
struct GoogleCallbackQuery {
    /// Authorization code
    code: Option<String>,
    /// CSRF state token
    state: Option<String>,
    /// Set when the user denied consent
    error: Option<String>,
}

/// GET /auth/google/callback
///
/// # Steps
/// 1. Verify CSRF state
/// 2. Run the federated sign-in (a denied consent is a failed attempt)
/// 3. Set session cookie and redirect to the calendar, or back to login
async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<GoogleCallbackQuery>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    verify_csrf_state(query.state.as_deref(), &jar)?;
    let jar = jar.add(cookies::clear_oauth_state(&state.config));

    let flow = match (query.error, query.code) {
        (None, Some(code)) if !code.is_empty() => FederatedFlow::Completed(GoogleAuthorization {
            code,
            redirect_uri: state.config.google_redirect_uri(),
        }),
        (Some(reason), _) => FederatedFlow::Cancelled { reason },
        _ => FederatedFlow::Cancelled {
            reason: "missing authorization code".to_string(),
        },
    };

    let (jar, client) = cookies::client_id(&state.config, jar);
    let session = state.sessions.session(&client).await;
    let result = session.federated_sign_in(flow).await;
    Ok(complete(&state, jar, result, ""))
}

/// Verify CSRF state from cookie matches callback state
fn verify_csrf_state(returned: Option<&str>, jar: &CookieJar) -> Result<(), AppError> {
    let expected = jar.get(cookies::OAUTH_STATE_COOKIE).map(|cookie| cookie.value());

    match (returned, expected) {
        (Some(returned), Some(expected)) if !expected.is_empty() && returned == expected => Ok(()),
        _ => {
            tracing::warn!("OAuth state mismatch on Google callback");
            Err(AppError::Forbidden)
        }
    }
}

// =============================================================================
// Logout
// =============================================================================

/// POST /logout
///
/// Ends the browser's auth session, clears its cookies and redirects to login.
async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    if let Some(client) = cookies::existing_client_id(&jar) {
        state.sessions.end(&client).await;
    }
    tracing::info!("Session cookie cleared");
    let jar = jar
        .add(cookies::clear_session(&state.config))
        .add(cookies::clear_client_id(&state.config));
    (jar, Redirect::to(LOGIN_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_extra::extract::cookie::Cookie;

    #[test]
    fn csrf_state_is_random_alphanumeric() {
        let first = cookies::random_token();
        let second = cookies::random_token();

        assert_eq!(first.len(), 32);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(first, second);
    }

    #[test]
    fn csrf_state_must_match_cookie() {
        let jar = CookieJar::new().add(Cookie::new(cookies::OAUTH_STATE_COOKIE, "abc"));

        assert!(verify_csrf_state(Some("abc"), &jar).is_ok());
        assert!(matches!(
            verify_csrf_state(Some("xyz"), &jar),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            verify_csrf_state(None, &jar),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            verify_csrf_state(Some("abc"), &CookieJar::new()),
            Err(AppError::Forbidden)
        ));
    }
}
