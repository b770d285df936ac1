use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use cookie::Cookie;
use serde_json::{Value, json};
use tokio::sync::watch;

use crate::config::ClientConfig;
use crate::cookies;
use crate::error::Error;
use crate::guard;
use crate::storage::TokenStorage;
use crate::token;
use crate::transport::{ApiRequest, Transport};
use crate::types::{AuthResponse, AuthToken, AuthUser, Session, UserId};

/// Single owner of the client's authentication state.
///
/// The in-memory [`Session`] is replaced as a whole on every write, so readers
/// see either the old session or the new one. A remembered token is mirrored
/// into [`TokenStorage`] and survives the manager being rebuilt. Memory,
/// durable storage and the change channel are updated under one write lock.
pub struct SessionManager<T> {
    transport: Arc<T>,
    storage: Arc<dyn TokenStorage>,
    auth_collection: String,
    storage_key: String,
    cookie_name: String,
    state: RwLock<State>,
    changes: watch::Sender<AuthToken>,
}

struct State {
    session: Session,
    /// False after a durable write failed; storage is not consulted until the
    /// next successful install.
    storage_trusted: bool,
}

impl Default for State {
    fn default() -> Self {
        Self {
            session: Session::default(),
            storage_trusted: true,
        }
    }
}

impl<T: Transport> SessionManager<T> {
    #[must_use]
    pub fn new(transport: Arc<T>, storage: Arc<dyn TokenStorage>, config: &ClientConfig) -> Self {
        let (changes, _) = watch::channel(AuthToken::default());
        Self {
            transport,
            storage,
            auth_collection: config.auth_collection.clone(),
            storage_key: config.storage_key.clone(),
            cookie_name: config.cookie_name.clone(),
            state: RwLock::new(State::default()),
            changes,
        }
    }

    /// Authenticate with identifier (email or username) and password.
    ///
    /// With `remember` the token is also written to durable storage; without it
    /// any previously remembered token is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty identifier or secret without
    /// contacting the backend. Any backend or transport failure clears the
    /// session and is returned as is.
    pub async fn authenticate(
        &self,
        identifier: &str,
        secret: &str,
        remember: bool,
    ) -> Result<AuthUser, Error> {
        if identifier.trim().is_empty() {
            return Err(Error::InvalidInput("identifier is required"));
        }
        if secret.is_empty() {
            return Err(Error::InvalidInput("password is required"));
        }

        let request = ApiRequest::post(self.auth_path("auth-with-password"))
            .with_body(json!({ "identity": identifier, "password": secret }));

        match self.transport.send(request).await.and_then(decode_auth) {
            Ok(auth) => {
                let user = auth.record.clone();
                self.install(auth, remember);
                tracing::info!(user_id = %user.id, remember, "password authentication succeeded");
                Ok(user)
            }
            Err(e) => {
                tracing::warn!(error = %e, "password authentication failed");
                self.clear();
                Err(e)
            }
        }
    }

    /// Current token, or an empty string when there is none.
    ///
    /// Prefers a valid in-memory session and falls back to an unexpired token
    /// in durable storage.
    #[must_use]
    pub fn token(&self) -> String {
        let state = self.read();
        if state.session.is_valid() {
            return state.session.token.to_string();
        }
        self.durable_token(&state).unwrap_or_default()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !self.token().is_empty()
    }

    /// Id of the authenticated user, if the in-memory session is valid.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        let state = self.read();
        let session = &state.session;
        session.is_valid().then(|| session.user_id.clone()).flatten()
    }

    /// Snapshot of the in-memory session.
    #[must_use]
    pub fn session(&self) -> Session {
        self.read().session.clone()
    }

    /// Re-validate the current token with the client's own transport.
    ///
    /// # Errors
    ///
    /// See [`refresh_with`](Self::refresh_with).
    pub async fn refresh(&self) -> Result<(), Error> {
        self.refresh_with(self.transport.as_ref()).await
    }

    /// Re-validate the current token over `transport`.
    ///
    /// Lets a navigation guard refresh through whatever transport its host
    /// framework provides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthenticated`] if there is no token to refresh.
    /// Any backend or transport failure is returned as is. In both cases the
    /// session has been cleared before this returns.
    pub async fn refresh_with<U: Transport>(&self, transport: &U) -> Result<(), Error> {
        let (token, remembered) = self.current_for_refresh();
        if token.is_empty() {
            self.clear();
            return Err(Error::NotAuthenticated);
        }

        let request = ApiRequest::post(self.auth_path("auth-refresh")).with_token(token);

        match transport.send(request).await.and_then(decode_auth) {
            Ok(auth) => {
                tracing::debug!(user_id = %auth.record.id, "auth token refreshed");
                self.install(auth, remembered);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "auth token refresh failed, clearing session");
                self.clear();
                Err(e)
            }
        }
    }

    /// Wipe the in-memory session and the remembered token. Idempotent.
    ///
    /// If the remembered token cannot be removed, durable storage is ignored
    /// until the next authentication or refresh.
    pub fn clear(&self) {
        let mut state = self.write();
        state.session = Session::default();
        state.storage_trusted = match self.storage.remove(&self.storage_key) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "failed to remove remembered auth token");
                false
            }
        };
        self.changes.send_replace(AuthToken::default());
    }

    /// Whether `path` is reachable without authentication.
    #[must_use]
    pub fn is_public_route(&self, path: &str) -> bool {
        guard::is_public_route(path)
    }

    /// Receiver that observes every token change, including clears.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthToken> {
        self.changes.subscribe()
    }

    /// Cookie carrying the current token for server-side route guards.
    #[must_use]
    pub fn auth_cookie(&self) -> Cookie<'static> {
        cookies::auth_token_cookie(&self.cookie_name, &AuthToken::from(self.token()))
    }

    /// Ask the backend to email a password-reset link.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty email, otherwise any backend error.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), Error> {
        if email.trim().is_empty() {
            return Err(Error::InvalidInput("email is required"));
        }
        self.post_auth_action("request-password-reset", json!({ "email": email }))
            .await
    }

    /// Set a new password using the token from a reset link.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty token or mismatched passwords,
    /// otherwise any backend error.
    pub async fn confirm_password_reset(
        &self,
        reset_token: &str,
        password: &str,
        password_confirm: &str,
    ) -> Result<(), Error> {
        if reset_token.is_empty() {
            return Err(Error::InvalidInput("reset token is required"));
        }
        if password.is_empty() {
            return Err(Error::InvalidInput("password is required"));
        }
        if password != password_confirm {
            return Err(Error::InvalidInput("passwords do not match"));
        }
        self.post_auth_action(
            "confirm-password-reset",
            json!({
                "token": reset_token,
                "password": password,
                "passwordConfirm": password_confirm,
            }),
        )
        .await
    }

    /// Ask the backend to send an email-verification link.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty email, otherwise any backend error.
    pub async fn request_verification(&self, email: &str) -> Result<(), Error> {
        if email.trim().is_empty() {
            return Err(Error::InvalidInput("email is required"));
        }
        self.post_auth_action("request-verification", json!({ "email": email }))
            .await
    }

    async fn post_auth_action(&self, action: &str, body: Value) -> Result<(), Error> {
        let request = ApiRequest::post(self.auth_path(action)).with_body(body);
        self.transport.send(request).await.map(|_| ()).inspect_err(|e| {
            tracing::warn!(error = %e, action, "auth action failed");
        })
    }

    fn auth_path(&self, action: &str) -> String {
        format!(
            "/api/collections/{}/{action}",
            urlencoding::encode(&self.auth_collection)
        )
    }

    /// Token to refresh and whether the refreshed one should be remembered.
    ///
    /// A token that only exists in durable storage was remembered by definition.
    fn current_for_refresh(&self) -> (AuthToken, bool) {
        let state = self.read();
        if state.session.is_valid() {
            return (state.session.token.clone(), state.session.remembered);
        }
        match self.durable_token(&state) {
            Some(token) => (AuthToken::from(token), true),
            None => (AuthToken::default(), false),
        }
    }

    fn durable_token(&self, state: &State) -> Option<String> {
        if !state.storage_trusted {
            return None;
        }
        self.storage
            .get(&self.storage_key)
            .filter(|t| !t.is_empty() && !token::is_expired(t))
    }

    fn install(&self, auth: AuthResponse, remembered: bool) {
        let token = auth.token;
        let mut state = self.write();
        state.session = Session::new(token.clone(), Some(auth.record.id), remembered);

        let persisted = if remembered {
            self.storage.set(&self.storage_key, token.as_str())
        } else {
            self.storage.remove(&self.storage_key)
        };
        state.storage_trusted = match persisted {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "failed to update remembered auth token");
                false
            }
        };

        self.changes.send_replace(token);
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn decode_auth(value: Value) -> Result<AuthResponse, Error> {
    serde_json::from_value(value).map_err(Into::into)
}
