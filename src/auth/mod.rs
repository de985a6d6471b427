//! Authentication
//!
//! Handles:
//! - Session guard (route protection)
//! - Auth session controller (sign-in state machine) and its per-browser registry
//! - Login, Google sign-in and logout routes

pub(crate) mod cookies;
mod error;
pub mod guard;
mod middleware;
pub mod registry;
mod routes;
pub mod session;

pub use error::AuthError;
pub use guard::{AUTH_COOKIE, GuardDecision, LANDING_PATH, LOGIN_PATH, RouteClass, classify, decide};
pub use middleware::{MaybeUser, session_guard};
pub use registry::SessionRegistry;
pub use routes::auth_router;
pub use session::{
    AuthOutcome, AuthSession, AuthState, FederatedFlow, Notice, NoticeLevel, Operation,
};
