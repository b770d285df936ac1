use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::client::Client;
use crate::error::Error;
use crate::transport::{ApiRequest, Query, Transport};
use crate::types::ListResult;

const FULL_LIST_BATCH: u32 = 500;

/// Query options for list reads.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub expand: Option<String>,
    pub fields: Option<String>,
    pub skip_total: bool,
}

impl ListOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    #[must_use]
    pub fn with_expand(mut self, expand: impl Into<String>) -> Self {
        self.expand = Some(expand.into());
        self
    }

    #[must_use]
    pub fn with_fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = Some(fields.into());
        self
    }

    #[must_use]
    pub fn with_skip_total(mut self, skip: bool) -> Self {
        self.skip_total = skip;
        self
    }

    fn to_query(&self, page: u32, per_page: u32) -> Query {
        let mut query = Query::new()
            .with("page", page.to_string())
            .with("perPage", per_page.to_string());
        if let Some(filter) = &self.filter {
            query.insert("filter", filter.as_str());
        }
        if let Some(sort) = &self.sort {
            query.insert("sort", sort.as_str());
        }
        if let Some(expand) = &self.expand {
            query.insert("expand", expand.as_str());
        }
        if let Some(fields) = &self.fields {
            query.insert("fields", fields.as_str());
        }
        if self.skip_total {
            query.insert("skipTotal", "1");
        }
        query
    }
}

/// Options for single-record reads and writes.
#[derive(Debug, Clone, Default)]
pub struct RecordOptions {
    pub expand: Option<String>,
    pub fields: Option<String>,
}

impl RecordOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_expand(mut self, expand: impl Into<String>) -> Self {
        self.expand = Some(expand.into());
        self
    }

    #[must_use]
    pub fn with_fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = Some(fields.into());
        self
    }

    fn to_query(&self) -> Query {
        let mut query = Query::new();
        if let Some(expand) = &self.expand {
            query.insert("expand", expand.as_str());
        }
        if let Some(fields) = &self.fields {
            query.insert("fields", fields.as_str());
        }
        query
    }
}

/// Record operations on one collection. Obtain via [`Client::collection`].
pub struct RecordService<'a, T> {
    client: &'a Client<T>,
    collection: String,
}

impl<'a, T: Transport> RecordService<'a, T> {
    pub(crate) fn new(client: &'a Client<T>, collection: String) -> Self {
        Self { client, collection }
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// One page of records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Superseded`] if an identical read replaced this one,
    /// otherwise any backend, transport or decode error.
    pub async fn get_list<R: DeserializeOwned>(
        &self,
        page: u32,
        per_page: u32,
        options: &ListOptions,
    ) -> Result<ListResult<R>, Error> {
        let request =
            ApiRequest::get(self.records_path()).with_query(options.to_query(page, per_page));
        decode(self.client.send(request).await?)
    }

    /// Every record matching `options`, fetched page by page.
    ///
    /// # Errors
    ///
    /// See [`get_list`](Self::get_list).
    pub async fn get_full_list<R: DeserializeOwned>(
        &self,
        options: &ListOptions,
    ) -> Result<Vec<R>, Error> {
        let options = options.clone().with_skip_total(true);
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let list: ListResult<R> = self.get_list(page, FULL_LIST_BATCH, &options).await?;
            let fetched = list.items.len();
            items.extend(list.items);
            if fetched < FULL_LIST_BATCH as usize {
                break;
            }
            page += 1;
        }
        Ok(items)
    }

    /// First record matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns a 404 [`Error::Api`] when nothing matches, otherwise see
    /// [`get_list`](Self::get_list).
    pub async fn get_first_list_item<R: DeserializeOwned>(
        &self,
        filter: &str,
        options: &ListOptions,
    ) -> Result<R, Error> {
        let options = options.clone().with_filter(filter).with_skip_total(true);
        let list: ListResult<R> = self.get_list(1, 1, &options).await?;
        list.items.into_iter().next().ok_or_else(|| Error::Api {
            status: 404,
            message: "The requested resource wasn't found.".into(),
        })
    }

    /// # Errors
    ///
    /// Returns any backend, transport or decode error.
    pub async fn get_one<R: DeserializeOwned>(
        &self,
        id: &str,
        options: &RecordOptions,
    ) -> Result<R, Error> {
        let request = ApiRequest::get(self.record_path(id)).with_query(options.to_query());
        decode(self.client.send(request).await?)
    }

    /// # Errors
    ///
    /// Returns any backend, transport or encode/decode error.
    pub async fn create<R: DeserializeOwned>(&self, body: &impl Serialize) -> Result<R, Error> {
        let request = ApiRequest::post(self.records_path()).with_body(serde_json::to_value(body)?);
        decode(self.client.send(request).await?)
    }

    /// # Errors
    ///
    /// Returns any backend, transport or encode/decode error.
    pub async fn update<R: DeserializeOwned>(
        &self,
        id: &str,
        body: &impl Serialize,
    ) -> Result<R, Error> {
        let request = ApiRequest::patch(self.record_path(id)).with_body(serde_json::to_value(body)?);
        decode(self.client.send(request).await?)
    }

    /// # Errors
    ///
    /// Returns any backend or transport error.
    pub async fn delete(&self, id: &str) -> Result<(), Error> {
        let request = ApiRequest::delete(self.record_path(id));
        self.client.send(request).await.map(|_| ())
    }

    fn records_path(&self) -> String {
        format!(
            "/api/collections/{}/records",
            urlencoding::encode(&self.collection)
        )
    }

    fn record_path(&self, id: &str) -> String {
        format!("{}/{}", self.records_path(), urlencoding::encode(id))
    }
}

fn decode<R: DeserializeOwned>(value: Value) -> Result<R, Error> {
    serde_json::from_value(value).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use reqwest::Method;
    use serde_json::json;

    use super::*;
    use crate::config::ClientConfig;
    use crate::error::Supersession;
    use crate::storage::{MemoryStorage, TokenStorage};
    use crate::testing::{MockTransport, Reply, auth_body, list_body};
    use crate::types::AuthToken;

    const TOPICS: &str = "/api/collections/topics/records";
    const REFRESH: &str = "/api/collections/users/auth-refresh";

    fn client(mock: &MockTransport) -> Client<MockTransport> {
        let storage = Arc::new(MemoryStorage::new());
        storage.set("authToken", "t1").unwrap();
        Client::with_parts(ClientConfig::default(), mock.clone(), storage)
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_401_refreshes_once_and_retries_once() {
        let mock = MockTransport::new();
        let one = format!("{TOPICS}/abc");
        mock.reply(Method::PATCH, &one, Reply::Status(401, "unauthorized"))
            .reply(Method::PATCH, &one, Reply::Json(json!({"id": "abc", "name": "Fractions"})));
        mock.reply(Method::POST, REFRESH, Reply::Json(auth_body("t2", "u1")));
        let client = client(&mock);

        let updated: Value = client
            .collection("topics")
            .update("abc", &json!({"name": "Fractions"}))
            .await
            .unwrap();

        assert_eq!(updated["name"], "Fractions");
        assert_eq!(mock.count(Method::POST, REFRESH), 1);
        let tokens: Vec<Option<AuthToken>> = mock
            .calls()
            .into_iter()
            .filter(|c| c.method == Method::PATCH)
            .map(|c| c.token)
            .collect();
        assert_eq!(
            tokens,
            vec![Some(AuthToken::new("t1")), Some(AuthToken::new("t2"))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_second_401_surfaces_verbatim() {
        let mock = MockTransport::new();
        let one = format!("{TOPICS}/abc");
        mock.reply(Method::PATCH, &one, Reply::Status(401, "unauthorized"));
        mock.reply(Method::POST, REFRESH, Reply::Json(auth_body("t2", "u1")));
        let client = client(&mock);

        let err = client
            .collection("topics")
            .update::<Value>("abc", &json!({"name": "Fractions"}))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "backend returned 401: unauthorized");
        assert_eq!(mock.count(Method::PATCH, &one), 2);
        assert_eq!(mock.count(Method::POST, REFRESH), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_list_sends_query_and_decodes() {
        let mock = MockTransport::new();
        mock.reply(Method::GET, TOPICS, Reply::Json(list_body(vec![json!({"id": "a"})])));
        let client = client(&mock);

        let list: ListResult<Value> = client
            .collection("topics")
            .get_list(1, 10, &ListOptions::new().with_sort("-created").with_expand("learner"))
            .await
            .unwrap();

        assert_eq!(list.items.len(), 1);
        let sent = &mock.calls()[0];
        assert_eq!(sent.query.get("sort"), Some("-created"));
        assert_eq!(sent.query.get("expand"), Some("learner"));
        assert_eq!(sent.query.get("perPage"), Some("10"));
        assert_eq!(sent.token, Some(AuthToken::new("t1")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_list_reads_through_client_are_debounced() {
        let mock = MockTransport::new();
        mock.reply(Method::GET, TOPICS, Reply::Json(list_body(vec![])));
        let client = client(&mock);
        let topics = client.collection("topics");
        let options = ListOptions::new().with_sort("-created");

        let (first, second) = tokio::join!(
            topics.get_list::<Value>(1, 30, &options),
            topics.get_list::<Value>(1, 30, &options),
        );

        assert!(matches!(first, Err(Error::Superseded(Supersession::Debounced))));
        assert!(second.is_ok());
        assert_eq!(mock.count(Method::GET, TOPICS), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_first_list_item_not_found() {
        let mock = MockTransport::new();
        mock.reply(Method::GET, TOPICS, Reply::Json(list_body(vec![])));
        let client = client(&mock);

        let err = client
            .collection("topics")
            .get_first_list_item::<Value>("name=\"none\"", &ListOptions::new())
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(404));
        let sent = &mock.calls()[0];
        assert_eq!(sent.query.get("filter"), Some("name=\"none\""));
        assert_eq!(sent.query.get("perPage"), Some("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_full_list_pages_until_short_batch() {
        let mock = MockTransport::new();
        let full: Vec<Value> = (0..FULL_LIST_BATCH).map(|i| json!({"id": i})).collect();
        mock.reply(Method::GET, TOPICS, Reply::Json(list_body(full)))
            .reply(Method::GET, TOPICS, Reply::Json(list_body(vec![json!({"id": "last"})])));
        let client = client(&mock);

        let items: Vec<Value> = client
            .collection("topics")
            .get_full_list(&ListOptions::new())
            .await
            .unwrap();

        assert_eq!(items.len(), FULL_LIST_BATCH as usize + 1);
        let pages: Vec<String> = mock
            .calls()
            .iter()
            .filter_map(|c| c.query.get("page").map(str::to_string))
            .collect();
        assert_eq!(pages, vec!["1", "2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_one_create_delete_paths() {
        let mock = MockTransport::new();
        let one = format!("{TOPICS}/abc");
        mock.reply(Method::GET, &one, Reply::Json(json!({"id": "abc"})));
        mock.reply(Method::POST, TOPICS, Reply::Json(json!({"id": "new"})));
        mock.reply(Method::DELETE, &one, Reply::Json(Value::Null));
        let client = client(&mock);
        let topics = client.collection("topics");

        let fetched: Value = topics
            .get_one("abc", &RecordOptions::new().with_expand("learner"))
            .await
            .unwrap();
        let created: Value = topics.create(&json!({"name": "Ratios"})).await.unwrap();
        topics.delete("abc").await.unwrap();

        assert_eq!(fetched["id"], "abc");
        assert_eq!(created["id"], "new");
        let calls = mock.calls();
        assert_eq!(calls[0].query.get("expand"), Some("learner"));
        assert_eq!(calls[1].body, Some(json!({"name": "Ratios"})));
        assert_eq!(calls[2].method, Method::DELETE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_anonymous_request_carries_no_token() {
        let mock = MockTransport::new();
        mock.reply(Method::GET, TOPICS, Reply::Json(list_body(vec![])));
        let client = Client::with_parts(
            ClientConfig::default(),
            mock.clone(),
            Arc::new(MemoryStorage::new()),
        );

        client
            .collection("topics")
            .get_list::<Value>(1, 30, &ListOptions::new())
            .await
            .unwrap();

        assert_eq!(mock.calls()[0].token, None);
    }
}
