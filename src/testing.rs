//! Scripted transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;

use crate::error::Error;
use crate::transport::{ApiRequest, Transport};

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Json(Value),
    Status(u16, &'static str),
    Aborted,
}

impl Reply {
    fn into_result(self) -> Result<Value, Error> {
        match self {
            Self::Json(value) => Ok(value),
            Self::Status(status, message) => Err(Error::Api {
                status,
                message: message.into(),
            }),
            Self::Aborted => Err(Error::Aborted("The request was autocancelled.".into())),
        }
    }
}

type Route = (Method, String);

#[derive(Default)]
struct Script {
    replies: HashMap<Route, VecDeque<Reply>>,
    calls: Vec<ApiRequest>,
    latency: Duration,
    in_flight: usize,
    max_in_flight: usize,
}

/// Replies are queued per method and path; the last one repeats.
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    script: Arc<Mutex<Script>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(&self, method: Method, path: &str, reply: Reply) -> &Self {
        let mut script = self.script.lock().unwrap();
        script
            .replies
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
        self
    }

    /// Every call sleeps this long before replying.
    pub(crate) fn set_latency(&self, latency: Duration) {
        self.script.lock().unwrap().latency = latency;
    }

    /// Highest number of calls that were running at the same time.
    pub(crate) fn max_in_flight(&self) -> usize {
        self.script.lock().unwrap().max_in_flight
    }

    pub(crate) fn calls(&self) -> Vec<ApiRequest> {
        self.script.lock().unwrap().calls.clone()
    }

    pub(crate) fn count(&self, method: Method, path: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }
}

impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, Error> {
        let (reply, latency) = {
            let mut script = self.script.lock().unwrap();
            let route = (request.method.clone(), request.path.clone());
            script.calls.push(request);
            script.in_flight += 1;
            script.max_in_flight = script.max_in_flight.max(script.in_flight);
            let reply = match script.replies.get_mut(&route) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            };
            (reply, script.latency)
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.script.lock().unwrap().in_flight -= 1;
        reply
            .unwrap_or(Reply::Status(404, "no reply scripted"))
            .into_result()
    }
}

pub(crate) fn auth_body(token: &str, user_id: &str) -> Value {
    serde_json::json!({
        "token": token,
        "record": { "id": user_id, "email": "learner@example.com", "verified": true }
    })
}

pub(crate) fn list_body(items: Vec<Value>) -> Value {
    let total = items.len();
    serde_json::json!({
        "page": 1,
        "perPage": 30,
        "totalItems": total,
        "totalPages": 1,
        "items": items,
    })
}
