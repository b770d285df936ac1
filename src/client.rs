use std::sync::Arc;

use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::Error;
use crate::gate::RequestGate;
use crate::records::RecordService;
use crate::retry::with_auth_retry;
use crate::session::SessionManager;
use crate::storage::{MemoryStorage, TokenStorage};
use crate::transport::{ApiRequest, HttpTransport, Transport};
use crate::types::AuthToken;

/// Backend client: one transport shared by a [`SessionManager`] and a [`RequestGate`].
///
/// ```rust,ignore
/// use tutor_session::{Client, ClientConfig, ListOptions};
///
/// let client = Client::new(ClientConfig::from_env()?);
/// client.session().authenticate("learner@example.com", "secret", true).await?;
///
/// let topics = client
///     .collection("practice_topics")
///     .get_list::<serde_json::Value>(1, 20, &ListOptions::new().with_sort("-created"))
///     .await?;
/// ```
pub struct Client<T = HttpTransport> {
    config: ClientConfig,
    transport: Arc<T>,
    session: SessionManager<T>,
    gate: RequestGate<T>,
}

impl Client<HttpTransport> {
    /// Client over HTTP with process-local token storage.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let transport = HttpTransport::new(config.base_url.clone());
        Self::with_parts(config, transport, Arc::new(MemoryStorage::new()))
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] if the environment holds an invalid setting.
    pub fn from_env() -> Result<Self, Error> {
        ClientConfig::from_env().map(Self::new)
    }
}

impl<T: Transport> Client<T> {
    /// Assemble a client from an explicit transport and durable token storage.
    #[must_use]
    pub fn with_parts(config: ClientConfig, transport: T, storage: Arc<dyn TokenStorage>) -> Self {
        let transport = Arc::new(transport);
        let session = SessionManager::new(transport.clone(), storage, &config);
        let gate = RequestGate::with_quiet_period(transport.clone(), config.debounce);
        Self {
            config,
            transport,
            session,
            gate,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub fn session(&self) -> &SessionManager<T> {
        &self.session
    }

    #[must_use]
    pub fn gate(&self) -> &RequestGate<T> {
        &self.gate
    }

    /// Record operations on one collection.
    #[must_use]
    pub fn collection(&self, name: impl Into<String>) -> RecordService<'_, T> {
        RecordService::new(self, name.into())
    }

    /// Send `request` with the current token through the gate, refreshing once on a 401.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Superseded`] for a list read that a newer one replaced,
    /// [`Error::SessionExpired`] if the token could not be refreshed, or the
    /// backend error of the final attempt.
    pub async fn send(&self, request: ApiRequest) -> Result<Value, Error> {
        with_auth_retry(&self.session, || {
            let attempt = request
                .clone()
                .with_token(AuthToken::from(self.session.token()));
            self.gate.dispatch(attempt)
        })
        .await
    }
}
