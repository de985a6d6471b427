//! Session guard middleware
//!
//! Runs before every handler and redirects based on credential presence.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;

use super::guard::{AUTH_COOKIE, decide};
use crate::AppState;
use crate::identity::{Credential, User};
use crate::metrics::GUARD_DECISIONS_TOTAL;

/// Middleware enforcing route classification
///
/// Only checks that the `auth-token` cookie exists; the credential is never
/// verified here.
///
/// # Usage
/// ```ignore
/// let app = Router::new()
///     .route("/calendar", ...)
///     .layer(middleware::from_fn(session_guard));
/// ```
pub async fn session_guard(jar: CookieJar, request: Request, next: Next) -> Response {
    let has_credential = jar.get(AUTH_COOKIE).is_some();
    let path = request.uri().path().to_owned();
    let decision = decide(has_credential, &path);

    GUARD_DECISIONS_TOTAL
        .with_label_values(&[decision.label()])
        .inc();

    match decision.location() {
        Some(location) => {
            tracing::debug!(
                path = %path,
                has_credential,
                location,
                "Session guard redirect"
            );
            Redirect::temporary(location).into_response()
        }
        None => next.run(request).await,
    }
}

/// Optional current user extractor
///
/// Resolves the `auth-token` cookie through the identity provider. Returns
/// `None` when there is no cookie or the provider does not recognise it.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<User>().cloned() {
            return Ok(MaybeUser(Some(user)));
        }

        let jar = CookieJar::from_headers(&parts.headers);
        let Some(token) = jar.get(AUTH_COOKIE).map(|cookie| cookie.value().to_owned()) else {
            return Ok(MaybeUser(None));
        };

        let app_state = AppState::from_ref(state);
        let user = match app_state.identity.lookup(&Credential::new(token, None)).await {
            Ok(user) => Some(user),
            Err(error) => {
                tracing::debug!(%error, "Session credential did not resolve to a user");
                None
            }
        };

        if let Some(user) = &user {
            parts.extensions.insert(user.clone());
        }

        Ok(MaybeUser(user))
    }
}
