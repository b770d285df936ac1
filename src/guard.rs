use crate::cookies;
use crate::session::SessionManager;
use crate::token;
use crate::transport::Transport;

/// Paths reachable without authentication (prefix match).
pub const PUBLIC_ROUTES: [&str; 5] = [
    "/login",
    "/forgot-password",
    "/reset-password",
    "/register",
    "/verify-email",
];

/// Whether `path` starts with one of [`PUBLIC_ROUTES`].
#[must_use]
pub fn is_public_route(path: &str) -> bool {
    PUBLIC_ROUTES.iter().any(|route| path.starts_with(route))
}

/// Outcome of a route check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// Protected path without a session; location carries the return URL.
    RedirectToLogin(String),
    /// Public-only path while already signed in.
    RedirectToLanding(String),
}

impl GuardDecision {
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::RedirectToLogin(location) | Self::RedirectToLanding(location) => Some(location),
        }
    }
}

/// Route access policy shared by the in-app and server-side guards.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct RouteGuard {
    pub(crate) login_path: String,
    pub(crate) landing_path: String,
    pub(crate) return_param: String,
    pub(crate) public_routes: Vec<String>,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self {
            login_path: "/login".into(),
            landing_path: "/dashboard".into(),
            return_param: "returnUrl".into(),
            public_routes: PUBLIC_ROUTES.iter().map(|r| (*r).to_string()).collect(),
        }
    }
}

impl RouteGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    #[must_use]
    pub fn with_landing_path(mut self, path: impl Into<String>) -> Self {
        self.landing_path = path.into();
        self
    }

    #[must_use]
    pub fn with_return_param(mut self, name: impl Into<String>) -> Self {
        self.return_param = name.into();
        self
    }

    #[must_use]
    pub fn with_public_routes(mut self, routes: Vec<String>) -> Self {
        self.public_routes = routes;
        self
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn landing_path(&self) -> &str {
        &self.landing_path
    }

    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        self.public_routes.iter().any(|route| path.starts_with(route.as_str()))
    }

    /// Decide what to do with a request for `path` (plus optional query string).
    #[must_use]
    pub fn decide(&self, path: &str, query: Option<&str>, authenticated: bool) -> GuardDecision {
        let public = self.is_public(path);
        match (public, authenticated) {
            (false, false) => GuardDecision::RedirectToLogin(self.login_location(path, query)),
            (true, true) => GuardDecision::RedirectToLanding(self.landing_path.clone()),
            _ => GuardDecision::Allow,
        }
    }

    /// Server-side check for hosts without the Axum layer: the request counts
    /// as authenticated when its `Cookie` header carries an unexpired token
    /// under `cookie_name`.
    #[must_use]
    pub fn decide_from_cookies(
        &self,
        path: &str,
        query: Option<&str>,
        cookie_header: Option<&str>,
        cookie_name: &str,
    ) -> GuardDecision {
        let authenticated = cookie_header
            .and_then(|header| cookies::token_from_header(header, cookie_name))
            .is_some_and(|t| !token::is_expired(t.as_str()));
        self.decide(path, query, authenticated)
    }

    /// In-app navigation check: public paths pass, protected paths need a
    /// token that survives a refresh over `transport`.
    pub async fn authorize<T: Transport, U: Transport>(
        &self,
        session: &SessionManager<T>,
        target: &str,
        transport: &U,
    ) -> GuardDecision {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };

        if self.is_public(path) {
            return GuardDecision::Allow;
        }
        if !session.is_authenticated() {
            return GuardDecision::RedirectToLogin(self.login_location(path, query));
        }

        match session.refresh_with(transport).await {
            Ok(()) => GuardDecision::Allow,
            Err(e) => {
                tracing::debug!(error = %e, path, "navigation refused after failed refresh");
                GuardDecision::RedirectToLogin(self.login_location(path, query))
            }
        }
    }

    fn login_location(&self, path: &str, query: Option<&str>) -> String {
        let return_url = match query {
            Some(q) if !q.is_empty() => format!("{path}?{q}"),
            _ => path.to_string(),
        };
        format!(
            "{}?{}={}",
            self.login_path,
            self.return_param,
            urlencoding::encode(&return_url)
        )
    }
}
