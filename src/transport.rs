use std::collections::BTreeMap;
use std::future::Future;

use reqwest::Method;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::Error;
use crate::types::AuthToken;

const LIST_PREFIX: &str = "/api/collections/";
const LIST_SUFFIX: &str = "/records";

/// Query parameters of a backend request, kept in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query(BTreeMap<String, String>);

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value for `key`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Form-encoded pairs in key order.
    #[must_use]
    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
    }
}

/// One call against the backend.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Query,
    pub body: Option<Value>,
    pub token: Option<AuthToken>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Query::default(),
            body: None,
            token: None,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach a bearer token; an empty token leaves the request anonymous.
    #[must_use]
    pub fn with_token(mut self, token: AuthToken) -> Self {
        self.token = (!token.is_empty()).then_some(token);
        self
    }

    /// `GET /api/collections/{collection}/records`
    #[must_use]
    pub fn is_list_read(&self) -> bool {
        self.method == Method::GET
            && self.path.len() > LIST_PREFIX.len() + LIST_SUFFIX.len()
            && self.path.starts_with(LIST_PREFIX)
            && self.path.ends_with(LIST_SUFFIX)
    }

    /// Identity of the result set this request asks for.
    #[must_use]
    pub fn debounce_key(&self) -> String {
        format!("{}?{}", self.path, self.query.encode())
    }
}

/// Sends requests to the backend.
///
/// Implementations decode successful bodies as JSON (`null` for empty bodies)
/// and map non-success statuses to [`Error::Api`]. A transport that drops a
/// request because a duplicate replaced it reports [`Error::Aborted`].
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: ApiRequest) -> impl Future<Output = Result<Value, Error>> + Send;
}

/// Error body returned by the backend.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// [`Transport`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpTransport {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Joins `path` onto the base URL, keeping any path prefix the base carries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if the result is not a valid URL.
    pub fn build_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(format!("{base}/{path}").parse()?)
    }

    /// Checks HTTP response status; returns the response on success or the backend's message.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or(body);
        Err(Error::Api { status, message })
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, Error> {
        let url = self.build_url(&request.path)?;

        let mut builder = self.http.request(request.method.clone(), url);
        if !request.query.is_empty() {
            let pairs: Vec<(&str, &str)> = request.query.iter().collect();
            builder = builder.query(&pairs);
        }
        if let Some(token) = &request.token {
            builder = builder.bearer_auth(token.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let response = Self::ensure_success(response).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_read_shape() {
        assert!(ApiRequest::get("/api/collections/topics/records").is_list_read());
        assert!(!ApiRequest::get("/api/collections/topics/records/abc").is_list_read());
        assert!(!ApiRequest::post("/api/collections/topics/records").is_list_read());
        assert!(!ApiRequest::get("/api/collections/records").is_list_read());
        assert!(!ApiRequest::get("/api/health").is_list_read());
    }

    #[test]
    fn test_debounce_key_ignores_insertion_order() {
        let a = ApiRequest::get("/api/collections/topics/records")
            .with_query(Query::new().with("sort", "-created").with("filter", "a=1"));
        let b = ApiRequest::get("/api/collections/topics/records")
            .with_query(Query::new().with("filter", "a=1").with("sort", "-created"));
        assert_eq!(a.debounce_key(), b.debounce_key());
    }

    #[test]
    fn test_debounce_key_separates_filters() {
        let a = ApiRequest::get("/api/collections/topics/records")
            .with_query(Query::new().with("filter", "name=\"a\""));
        let b = ApiRequest::get("/api/collections/topics/records")
            .with_query(Query::new().with("filter", "name=\"b\""));
        assert_ne!(a.debounce_key(), b.debounce_key());
    }

    #[test]
    fn test_empty_token_is_not_attached() {
        let request = ApiRequest::get("/x").with_token(AuthToken::default());
        assert!(request.token.is_none());
        let request = ApiRequest::get("/x").with_token(AuthToken::new("t"));
        assert_eq!(request.token, Some(AuthToken::new("t")));
    }

    #[test]
    fn test_build_url_keeps_base_prefix() {
        let transport = HttpTransport::new("https://example.com/pb/".parse().unwrap());
        let url = transport.build_url("/api/collections/topics/records").unwrap();
        assert_eq!(url.as_str(), "https://example.com/pb/api/collections/topics/records");

        let transport = HttpTransport::new("http://localhost:8787".parse().unwrap());
        let url = transport.build_url("api/health").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8787/api/health");
    }
}
