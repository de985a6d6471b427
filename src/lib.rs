//! calgate - authentication front door for a calendar web app
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Session Guard (middleware)                  │
//! │  - auth-token cookie presence                               │
//! │  - /auth ⇄ /calendar redirects                              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Routes (Axum)                           │
//! │  - Login / Google sign-in / logout                          │
//! │  - Calendar month view                                      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Auth Session Controller                      │
//! │  - Unauthenticated → Authenticating → Authenticated         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Identity Provider (Firebase REST)               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `auth`: session guard, controller and auth routes
//! - `identity`: provider port and Firebase adapter
//! - `calendar`: protected calendar pages
//! - `pages`: HTML rendering
//! - `config`: Configuration management
//! - `error`: Error types

pub mod auth;
pub mod calendar;
pub mod config;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod pages;

use std::sync::Arc;

use axum::{
    Router,
    http::{StatusCode, Uri, header},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use prometheus::{Encoder, TextEncoder};

use identity::IdentityProvider;

/// Application state shared across all handlers
///
/// Cloned for each request. The credential itself lives in the `auth-token`
/// cookie; the registry owns each browser's in-progress `AuthSession`.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// External identity service
    pub identity: Arc<dyn IdentityProvider>,

    /// Auth sessions keyed by the browser's client id
    pub sessions: Arc<auth::SessionRegistry>,
}

impl AppState {
    /// Initialize application state with the Firebase adapter
    ///
    /// # Errors
    /// Returns error if the identity provider client cannot be built
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let identity = identity::FirebaseIdentityProvider::new(&config.identity)?;
        tracing::info!(
            endpoint = %config.identity.identity_toolkit_url,
            "Identity provider initialized"
        );

        Ok(Self::with_identity(config, Arc::new(identity)))
    }

    /// Build state around an arbitrary provider
    pub fn with_identity(config: config::AppConfig, identity: Arc<dyn IdentityProvider>) -> Self {
        let idle_timeout = std::time::Duration::from_secs(config.session.max_age.unsigned_abs());
        let sessions = auth::SessionRegistry::new(Arc::clone(&identity), idle_timeout);
        Self {
            config: Arc::new(config),
            identity,
            sessions: Arc::new(sessions),
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments. The session guard wraps every
/// route, including the 404 fallback.
pub fn build_router(state: AppState) -> Router {
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    metrics::init_metrics();

    Router::new()
        .route("/", get(|| async { Redirect::temporary(auth::LANDING_PATH) }))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .merge(auth::auth_router())
        .merge(calendar::calendar_router())
        .fallback(not_found)
        .layer(middleware::from_fn(auth::session_guard))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

/// Returns all metrics in Prometheus text format.
async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = metrics::REGISTRY.gather();

    match encoder.encode_to_string(&metric_families) {
        Ok(metrics_text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            metrics_text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    tracing::warn!(path = %uri.path(), "User attempted to access non-existent route");
    (StatusCode::NOT_FOUND, pages::not_found_page())
}
