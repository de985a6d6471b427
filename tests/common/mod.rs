//! Common test utilities for E2E tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::header;
use calgate::identity::{
    AuthGrant, Credential, GoogleAuthorization, IdentityProvider, ProviderError, SignInMethod,
    User,
};
use calgate::{AppState, config};
use reqwest::Response;
use tokio::net::TcpListener;

pub const GOOD_GOOGLE_CODE: &str = "good-code";
pub const GOOGLE_EMAIL: &str = "google.user@example.com";

/// In-memory identity provider with Firebase-style error codes
#[derive(Default)]
pub struct StubIdentityProvider {
    accounts: Mutex<HashMap<String, String>>,
    calls: AtomicUsize,
}

impl StubIdentityProvider {
    pub fn with_account(email: &str, password: &str) -> Self {
        let stub = Self::default();
        stub.accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), password.to_string());
        stub
    }

    /// Number of sign-in / sign-up / Google calls received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn grant(email: &str, method: SignInMethod) -> AuthGrant {
        AuthGrant {
            user: User {
                uid: format!("uid-{}", token_for(email)),
                email: Some(email.to_string()),
                display_name: None,
                method,
            },
            credential: Credential::new(token_for(email), Some(3600)),
        }
    }
}

pub fn token_for(email: &str) -> String {
    format!("token-{}", email.replace('@', "-at-"))
}

#[async_trait]
impl IdentityProvider for StubIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthGrant, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let accounts = self.accounts.lock().unwrap();
        match accounts.get(email) {
            None => Err(ProviderError::rejected("EMAIL_NOT_FOUND")),
            Some(stored) if stored != password => {
                Err(ProviderError::rejected("INVALID_LOGIN_CREDENTIALS"))
            }
            Some(_) => Ok(Self::grant(email, SignInMethod::Password)),
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthGrant, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(email) {
            return Err(ProviderError::rejected("EMAIL_EXISTS"));
        }
        accounts.insert(email.to_string(), password.to_string());
        Ok(Self::grant(email, SignInMethod::Password))
    }

    async fn sign_in_with_google(
        &self,
        authorization: &GoogleAuthorization,
    ) -> Result<AuthGrant, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if authorization.code == GOOD_GOOGLE_CODE {
            Ok(Self::grant(GOOGLE_EMAIL, SignInMethod::Google))
        } else {
            Err(ProviderError::rejected("invalid_grant"))
        }
    }

    async fn lookup(&self, credential: &Credential) -> Result<User, ProviderError> {
        let accounts = self.accounts.lock().unwrap();
        accounts
            .keys()
            .map(String::as_str)
            .chain(std::iter::once(GOOGLE_EMAIL))
            .find(|email| token_for(email) == credential.token())
            .map(|email| Self::grant(email, SignInMethod::Password).user)
            .ok_or_else(|| ProviderError::rejected("INVALID_ID_TOKEN"))
    }
}

pub fn test_config() -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            domain: "localhost:3000".to_string(),
            protocol: "http".to_string(),
        },
        identity: config::IdentityConfig {
            api_key: "test-api-key".to_string(),
            identity_toolkit_url: "http://127.0.0.1:9/v1".to_string(),
            google: config::GoogleOAuthConfig {
                client_id: "test-client-id".to_string(),
                client_secret: "test-client-secret".to_string(),
                auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                token_url: "http://127.0.0.1:9/token".to_string(),
            },
        },
        session: config::SessionConfig { max_age: 3600 },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

/// Server bound to a random local port, backed by an in-memory provider
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub identity: Arc<StubIdentityProvider>,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::with_identity(StubIdentityProvider::default()).await
    }

    pub async fn with_identity(identity: StubIdentityProvider) -> Self {
        let identity = Arc::new(identity);
        let state = AppState::with_identity(test_config(), identity.clone());

        // Redirects are asserted on, never followed
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());

        let app = calgate::build_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            identity,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response {
        let mut request = self.client.get(self.url(path));
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        request.send().await.expect("request succeeds")
    }

    pub async fn post(&self, path: &str, cookie: Option<&str>) -> Response {
        let mut request = self.client.post(self.url(path));
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        request.send().await.expect("request succeeds")
    }

    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Response {
        self.post_form_with_cookie(path, form, None).await
    }

    pub async fn post_form_with_cookie(
        &self,
        path: &str,
        form: &[(&str, &str)],
        cookie: Option<&str>,
    ) -> Response {
        let mut request = self.client.post(self.url(path)).form(form);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        request.send().await.expect("request succeeds")
    }
}

pub fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
}

/// All `Set-Cookie` header values
pub fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(ToOwned::to_owned)
        .collect()
}

/// `Set-Cookie` value for `name`, if the response sets it
pub fn set_cookie(response: &Response, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    set_cookies(response)
        .into_iter()
        .find(|cookie| cookie.starts_with(&prefix))
}

/// `name=value` pair suitable for a `Cookie` request header
pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .unwrap_or_default()
        .to_string()
}

pub async fn body_text(response: Response) -> String {
    response.text().await.expect("response body")
}
