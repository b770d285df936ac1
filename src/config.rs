use std::time::Duration;

use url::Url;

use crate::error::Error;

pub(crate) const DEFAULT_BASE_URL: &str = "http://localhost:8787";
pub(crate) const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Client configuration.
///
/// Required field (`base_url`) is a constructor parameter; everything else has a default.
///
/// ```rust,ignore
/// use tutor_session::ClientConfig;
///
/// let config = ClientConfig::new("https://tutor.example.com".parse()?)
///     .with_auth_collection("instructors");
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) base_url: Url,
    pub(crate) auth_collection: String,
    pub(crate) debounce: Duration,
    pub(crate) storage_key: String,
    pub(crate) cookie_name: String,
}

impl ClientConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            auth_collection: "users".into(),
            debounce: DEFAULT_DEBOUNCE,
            storage_key: "authToken".into(),
            cookie_name: "pb_auth_token".into(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Optional env vars
    /// - `POCKETBASE_URL`: Backend origin (default `http://localhost:8787`)
    /// - `AUTH_COLLECTION`: Collection used for password auth (default `users`)
    /// - `REQUEST_DEBOUNCE_MS`: Quiet period for repeated list reads (default `300`)
    /// - `AUTH_COOKIE_NAME`: Name of the auth token cookie (default `pb_auth_token`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, Error> {
        let base_url: Url = std::env::var("POCKETBASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
            .parse()
            .map_err(|e| Error::Config(format!("POCKETBASE_URL: {e}")))?;

        let mut config = Self::new(base_url);

        if let Ok(collection) = std::env::var("AUTH_COLLECTION") {
            config = config.with_auth_collection(collection);
        }
        if let Ok(ms) = std::env::var("REQUEST_DEBOUNCE_MS") {
            let ms: u64 = ms
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("REQUEST_DEBOUNCE_MS: {e}")))?;
            config = config.with_debounce(Duration::from_millis(ms));
        }
        if let Ok(name) = std::env::var("AUTH_COOKIE_NAME") {
            config = config.with_cookie_name(name);
        }

        Ok(config)
    }

    /// Override the collection used for password auth and token refresh.
    #[must_use]
    pub fn with_auth_collection(mut self, collection: impl Into<String>) -> Self {
        self.auth_collection = collection.into();
        self
    }

    /// Override the quiet period applied to repeated list reads.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Override the durable storage key holding a remembered token.
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Override the auth token cookie name.
    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn auth_collection(&self) -> &str {
        &self.auth_collection
    }

    #[must_use]
    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_BASE_URL
                .parse()
                .expect("valid default URL"),
        )
    }
}
