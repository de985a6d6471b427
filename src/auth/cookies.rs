//! Cookies set by the auth routes

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rand::{Rng, distributions::Alphanumeric};
use time::Duration;

use super::guard::AUTH_COOKIE;
use super::session::Notice;
use crate::config::AppConfig;
use crate::identity::Credential;

pub(crate) const OAUTH_STATE_COOKIE: &str = "oauth_state";
const FLASH_COOKIE: &str = "flash";
pub(crate) const CLIENT_COOKIE: &str = "client_id";

const RANDOM_TOKEN_LEN: usize = 32;

/// Random alphanumeric value for CSRF state and client ids
pub(crate) fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_TOKEN_LEN)
        .map(char::from)
        .collect()
}

fn base(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

fn expired(name: &'static str, secure: bool) -> Cookie<'static> {
    let mut cookie = base(name, String::new(), secure);
    cookie.set_max_age(Duration::ZERO);
    cookie
}

/// `auth-token` cookie carrying the provider's credential
pub(crate) fn session_cookie(config: &AppConfig, credential: &Credential) -> Cookie<'static> {
    let max_age = credential
        .expires_in()
        .filter(|seconds| *seconds > 0)
        .unwrap_or(config.session.max_age);

    let mut cookie = base(
        AUTH_COOKIE,
        credential.token().to_owned(),
        config.should_use_secure_cookies(),
    );
    cookie.set_max_age(Duration::seconds(max_age));
    cookie
}

pub(crate) fn clear_session(config: &AppConfig) -> Cookie<'static> {
    expired(AUTH_COOKIE, config.should_use_secure_cookies())
}

/// Short-lived CSRF state for the Google round trip
pub(crate) fn oauth_state_cookie(config: &AppConfig, state: String) -> Cookie<'static> {
    let mut cookie = base(OAUTH_STATE_COOKIE, state, config.should_use_secure_cookies());
    cookie.set_max_age(Duration::minutes(10));
    cookie
}

pub(crate) fn clear_oauth_state(config: &AppConfig) -> Cookie<'static> {
    expired(OAUTH_STATE_COOKIE, config.should_use_secure_cookies())
}

/// The browser's client id, issuing a fresh one when missing or malformed
pub(crate) fn client_id(config: &AppConfig, jar: CookieJar) -> (CookieJar, String) {
    if let Some(id) = existing_client_id(&jar) {
        return (jar, id);
    }

    let id = random_token();
    let mut cookie = base(CLIENT_COOKIE, id.clone(), config.should_use_secure_cookies());
    cookie.set_max_age(Duration::seconds(config.session.max_age));
    (jar.add(cookie), id)
}

/// The client id the browser already holds, if well formed
pub(crate) fn existing_client_id(jar: &CookieJar) -> Option<String> {
    jar.get(CLIENT_COOKIE)
        .map(|cookie| cookie.value())
        .filter(|id| id.len() == RANDOM_TOKEN_LEN && id.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(ToOwned::to_owned)
}

pub(crate) fn clear_client_id(config: &AppConfig) -> Cookie<'static> {
    expired(CLIENT_COOKIE, config.should_use_secure_cookies())
}

/// Carry a success notice across the post-login redirect
pub(crate) fn flash_cookie(config: &AppConfig, notice: &Notice) -> Cookie<'static> {
    let mut cookie = base(
        FLASH_COOKIE,
        urlencoding::encode(&notice.message).into_owned(),
        config.should_use_secure_cookies(),
    );
    cookie.set_max_age(Duration::minutes(1));
    cookie
}

/// Read and clear the flash notice, if one is pending
pub(crate) fn take_flash(config: &AppConfig, jar: CookieJar) -> (CookieJar, Option<Notice>) {
    let Some(raw) = jar.get(FLASH_COOKIE).map(|cookie| cookie.value().to_owned()) else {
        return (jar, None);
    };

    let notice = urlencoding::decode(&raw)
        .ok()
        .map(|message| Notice::success(message.into_owned()));
    let jar = jar.add(expired(FLASH_COOKIE, config.should_use_secure_cookies()));
    (jar, notice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::valid_config;

    #[test]
    fn session_cookie_uses_provider_expiry() {
        let config = valid_config();
        let cookie = session_cookie(&config, &Credential::new("token", Some(120)));

        assert_eq!(cookie.name(), "auth-token");
        assert_eq!(cookie.value(), "token");
        assert_eq!(cookie.max_age(), Some(Duration::seconds(120)));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    }

    #[test]
    fn session_cookie_falls_back_to_configured_max_age() {
        let config = valid_config();
        let cookie = session_cookie(&config, &Credential::new("token", None));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(3600)));
    }

    #[test]
    fn cleared_session_expires_immediately() {
        let cookie = clear_session(&valid_config());
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        assert_eq!(cookie.value(), "");
    }

    #[test]
    fn flash_round_trips_through_jar() {
        let config = valid_config();
        let notice = Notice::success("Welcome back!");
        let jar = CookieJar::new().add(flash_cookie(&config, &notice));

        let (_, taken) = take_flash(&config, jar);
        assert_eq!(taken, Some(notice));
    }

    #[test]
    fn client_id_is_issued_once() {
        let config = valid_config();
        let (jar, issued) = client_id(&config, CookieJar::new());
        assert_eq!(issued.len(), RANDOM_TOKEN_LEN);
        assert_eq!(jar.get(CLIENT_COOKIE).map(|c| c.value()), Some(issued.as_str()));

        let (_, again) = client_id(&config, jar);
        assert_eq!(again, issued);
    }

    #[test]
    fn malformed_client_id_is_replaced() {
        let config = valid_config();
        let jar = CookieJar::new().add(Cookie::new(CLIENT_COOKIE, "../../etc"));
        let (_, id) = client_id(&config, jar);
        assert_ne!(id, "../../etc");
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn take_flash_without_cookie_is_none() {
        let (_, taken) = take_flash(&valid_config(), CookieJar::new());
        assert_eq!(taken, None);
    }
}
