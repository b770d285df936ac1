use super::error::GuardError;
use crate::guard::RouteGuard;

/// Server-side route guard configuration.
///
/// Use [`from_env()`](GuardConfig::from_env) for convention-based setup,
/// or [`new()`](GuardConfig::new) with `with_*` methods for full control.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    pub(super) guard: RouteGuard,
    pub(super) cookie_name: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self::new(RouteGuard::default())
    }
}

impl GuardConfig {
    #[must_use]
    pub fn new(guard: RouteGuard) -> Self {
        Self {
            guard,
            cookie_name: "pb_auth_token".into(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Optional env vars
    /// - `AUTH_COOKIE_NAME`: Cookie carrying the client's token (default `pb_auth_token`)
    /// - `LOGIN_PATH`: Where unauthenticated requests are sent (default `/login`)
    /// - `LANDING_PATH`: Where signed-in visitors of public pages are sent (default `/dashboard`)
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Config`] if a path variable does not start with `/`.
    pub fn from_env() -> Result<Self, GuardError> {
        let mut guard = RouteGuard::new();

        if let Ok(path) = std::env::var("LOGIN_PATH") {
            guard = guard.with_login_path(absolute_path("LOGIN_PATH", path)?);
        }
        if let Ok(path) = std::env::var("LANDING_PATH") {
            guard = guard.with_landing_path(absolute_path("LANDING_PATH", path)?);
        }

        let mut config = Self::new(guard);
        if let Ok(name) = std::env::var("AUTH_COOKIE_NAME") {
            config = config.with_cookie_name(name);
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_guard(mut self, guard: RouteGuard) -> Self {
        self.guard = guard;
        self
    }

    #[must_use]
    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }
}

fn absolute_path(var: &str, path: String) -> Result<String, GuardError> {
    if path.starts_with('/') {
        Ok(path)
    } else {
        Err(GuardError::Config(format!("{var} must start with '/': {path}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GuardConfig::default();
        assert_eq!(config.cookie_name(), "pb_auth_token");
        assert_eq!(config.guard().login_path(), "/login");
        assert_eq!(config.guard().landing_path(), "/dashboard");
    }

    #[test]
    fn test_relative_paths_are_rejected() {
        assert!(absolute_path("LOGIN_PATH", "/signin".into()).is_ok());
        assert!(matches!(
            absolute_path("LOGIN_PATH", "signin".into()),
            Err(GuardError::Config(_))
        ));
    }
}
