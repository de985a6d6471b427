//! Route classification and the session guard decision.
//!
//! Pure functions only; the axum wiring lives in `middleware.rs`.

/// Cookie holding the session credential
pub const AUTH_COOKIE: &str = "auth-token";

/// Login screen; must not be visited while authenticated
pub const LOGIN_PATH: &str = "/auth";

/// Where authenticated users land
pub const LANDING_PATH: &str = "/calendar";

/// Everything under this prefix requires a session
pub const PROTECTED_PREFIX: &str = "/calendar";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    AuthOnly,
    Protected,
}

#[derive(Debug, Clone, Copy)]
enum PathMatch {
    Exact,
    Prefix,
}

const ROUTE_TABLE: &[(&str, PathMatch, RouteClass)] = &[
    (LOGIN_PATH, PathMatch::Exact, RouteClass::AuthOnly),
    (PROTECTED_PREFIX, PathMatch::Prefix, RouteClass::Protected),
];

/// Classify a request path. First table entry that matches wins.
pub fn classify(path: &str) -> RouteClass {
    ROUTE_TABLE
        .iter()
        .find(|(pattern, kind, _)| match kind {
            PathMatch::Exact => path == *pattern,
            PathMatch::Prefix => path.starts_with(pattern),
        })
        .map(|(_, _, class)| *class)
        .unwrap_or(RouteClass::Public)
}

/// Outcome of the session guard for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Pass,
    RedirectToLanding,
    RedirectToLogin,
}

impl GuardDecision {
    /// Redirect target, `None` when the request passes through
    pub fn location(&self) -> Option<&'static str> {
        match self {
            GuardDecision::Pass => None,
            GuardDecision::RedirectToLanding => Some(LANDING_PATH),
            GuardDecision::RedirectToLogin => Some(LOGIN_PATH),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GuardDecision::Pass => "pass",
            GuardDecision::RedirectToLanding => "redirect_landing",
            GuardDecision::RedirectToLogin => "redirect_login",
        }
    }
}

/// Decide what to do with a request given credential presence and path.
pub fn decide(has_credential: bool, path: &str) -> GuardDecision {
    match (has_credential, classify(path)) {
        (true, RouteClass::AuthOnly) => GuardDecision::RedirectToLanding,
        (false, RouteClass::Protected) => GuardDecision::RedirectToLogin,
        _ => GuardDecision::Pass,
    }
}
