//! Firebase Identity Toolkit adapter
//!
//! Talks to the Identity Toolkit REST API (`accounts:*` endpoints) and to
//! Google's OAuth token endpoint for the federated flow.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use super::{
    AuthGrant, Credential, GoogleAuthorization, IdentityProvider, ProviderError, SignInMethod,
    User,
};
use crate::config::IdentityConfig;
use crate::error::AppError;

const GOOGLE_PROVIDER_ID: &str = "google.com";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Identity provider backed by Firebase Authentication
pub struct FirebaseIdentityProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    google_client_id: String,
    google_client_secret: String,
    google_token_url: String,
}

impl FirebaseIdentityProvider {
    /// Create a new adapter from configuration
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: &IdentityConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("calgate/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(15))
            .build()?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.identity_toolkit_url.trim_end_matches('/').to_string(),
            google_client_id: config.google.client_id.clone(),
            google_client_secret: config.google.client_secret.clone(),
            google_token_url: config.google.token_url.clone(),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/accounts:{}", self.base_url, method)
    }

    async fn call<B, R>(&self, method: &str, body: &B) -> Result<R, ProviderError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        // Key goes in a header, never in the URL.
        let response = self
            .http
            .post(self.endpoint(method))
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let code = response
                .json::<ErrorEnvelope>()
                .await
                .map(|envelope| envelope.error.message)
                .unwrap_or_else(|_| format!("HTTP_{}", status.as_u16()));
            tracing::debug!(method, %status, %code, "Identity Toolkit rejected request");
            return Err(ProviderError::Rejected { code });
        }

        Ok(response.json::<R>().await?)
    }

    async fn password_flow(
        &self,
        method: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthGrant, ProviderError> {
        let body = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        let response: TokenResponse = self.call(method, &body).await?;
        Ok(response.into_grant(SignInMethod::Password))
    }

    /// Exchange an authorization code for a Google ID token
    async fn exchange_google_code(
        &self,
        authorization: &GoogleAuthorization,
    ) -> Result<String, ProviderError> {
        let form = [
            ("code", authorization.code.as_str()),
            ("client_id", self.google_client_id.as_str()),
            ("client_secret", self.google_client_secret.as_str()),
            ("redirect_uri", authorization.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(self.google_token_url.as_str())
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let code = response
                .json::<GoogleTokenError>()
                .await
                .map(|error| error.error)
                .unwrap_or_else(|_| format!("HTTP_{}", status.as_u16()));
            return Err(ProviderError::Rejected { code });
        }

        let token: GoogleTokenResponse = response.json().await?;
        Ok(token.id_token)
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthGrant, ProviderError> {
        self.password_flow("signInWithPassword", email, password)
            .await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthGrant, ProviderError> {
        self.password_flow("signUp", email, password).await
    }

    async fn sign_in_with_google(
        &self,
        authorization: &GoogleAuthorization,
    ) -> Result<AuthGrant, ProviderError> {
        let id_token = self.exchange_google_code(authorization).await?;

        let post_body = format!(
            "id_token={}&providerId={}",
            urlencoding::encode(&id_token),
            GOOGLE_PROVIDER_ID
        );
        let body = IdpRequest {
            post_body: &post_body,
            request_uri: &authorization.redirect_uri,
            return_idp_credential: true,
            return_secure_token: true,
        };
        let response: TokenResponse = self.call("signInWithIdp", &body).await?;
        Ok(response.into_grant(SignInMethod::Google))
    }

    async fn lookup(&self, credential: &Credential) -> Result<User, ProviderError> {
        let body = LookupRequest {
            id_token: credential.token(),
        };
        let response: LookupResponse = self.call("lookup", &body).await?;

        let record = response
            .users
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::rejected("USER_NOT_FOUND"))?;

        let method = if record
            .provider_user_info
            .iter()
            .any(|info| info.provider_id == GOOGLE_PROVIDER_ID)
        {
            SignInMethod::Google
        } else {
            SignInMethod::Password
        };

        Ok(User {
            uid: record.local_id,
            email: record.email,
            display_name: record.display_name,
            method,
        })
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdpRequest<'a> {
    post_body: &'a str,
    request_uri: &'a str,
    return_idp_credential: bool,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    id_token: String,
    /// Seconds, encoded as a string by the API
    #[serde(default)]
    expires_in: Option<String>,
}

impl TokenResponse {
    fn into_grant(self, method: SignInMethod) -> AuthGrant {
        let expires_in = self.expires_in.as_deref().and_then(|s| s.parse().ok());
        AuthGrant {
            user: User {
                uid: self.local_id,
                email: self.email,
                display_name: self.display_name.filter(|name| !name.is_empty()),
                method,
            },
            credential: Credential::new(self.id_token, expires_in),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    provider_user_info: Vec<ProviderUserInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderUserInfo {
    provider_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    id_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenError {
    error: String,
}
