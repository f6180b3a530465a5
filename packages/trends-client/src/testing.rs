//! Testing utilities including a scripted transport.
//!
//! Useful for exercising polling behavior without a live backend. Pair with
//! `#[tokio::test(start_paused = true)]` so backoff sleeps complete instantly
//! and recorded call times are exact.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use crate::credentials::AuthHeaders;
use crate::error::{TransportError, TransportResult};
use crate::transport::JobTransport;

/// HTTP method of a recorded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Post,
    Get,
}

/// Record of a request made to the scripted transport.
#[derive(Debug, Clone)]
pub struct TransportCall {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub bearer: String,
    pub identity: Option<String>,
    pub at: Instant,
}

#[derive(Default)]
struct Route {
    responses: VecDeque<TransportResult<Value>>,
    latency: Duration,
}

/// A transport that answers from per-path response queues.
///
/// Each path serves its queued responses in order; the last one repeats once
/// the queue is down to it. Unscripted paths answer 404.
#[derive(Default, Clone)]
pub struct ScriptedTransport {
    routes: Arc<Mutex<HashMap<(Method, String), Route>>>,
    calls: Arc<Mutex<Vec<TransportCall>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `POST <path>`.
    pub fn on_post(self, path: impl Into<String>, response: TransportResult<Value>) -> Self {
        self.push(Method::Post, path.into(), response);
        self
    }

    /// Queue responses for `GET <path>`, served in order.
    pub fn on_get(
        self,
        path: impl Into<String>,
        responses: impl IntoIterator<Item = TransportResult<Value>>,
    ) -> Self {
        let path = path.into();
        for response in responses {
            self.push(Method::Get, path.clone(), response);
        }
        self
    }

    /// Delay every response on `path` (both methods).
    pub fn with_latency(self, path: impl Into<String>, latency: Duration) -> Self {
        let path = path.into();
        let mut routes = self.routes.lock().unwrap();
        for method in [Method::Post, Method::Get] {
            routes.entry((method, path.clone())).or_default().latency = latency;
        }
        drop(routes);
        self
    }

    fn push(&self, method: Method, path: String, response: TransportResult<Value>) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path))
            .or_default()
            .responses
            .push_back(response);
    }

    /// All calls made so far.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls with the given method.
    pub fn calls_of(&self, method: Method) -> Vec<TransportCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .collect()
    }

    /// Gaps between consecutive GETs, in milliseconds.
    pub fn get_gaps_ms(&self) -> Vec<u128> {
        self.calls_of(Method::Get)
            .windows(2)
            .map(|w| (w[1].at - w[0].at).as_millis())
            .collect()
    }

    async fn answer(
        &self,
        method: Method,
        url: &Url,
        body: Option<&Value>,
        auth: &AuthHeaders,
    ) -> TransportResult<Value> {
        let path = url.path().to_string();
        self.calls.lock().unwrap().push(TransportCall {
            method,
            path: path.clone(),
            body: body.cloned(),
            bearer: auth.bearer.expose().to_string(),
            identity: auth.identity.as_ref().map(|s| s.expose().to_string()),
            at: Instant::now(),
        });

        let (response, latency) = {
            let mut routes = self.routes.lock().unwrap();
            match routes.get_mut(&(method, path.clone())) {
                Some(route) => {
                    let response = if route.responses.len() > 1 {
                        route.responses.pop_front()
                    } else {
                        route.responses.front().cloned()
                    };
                    (response, route.latency)
                }
                None => (None, Duration::ZERO),
            }
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        response.unwrap_or_else(|| {
            Err(TransportError::Status {
                status: 404,
                body: format!("no script for {:?} {}", method, path),
            })
        })
    }
}

#[async_trait]
impl JobTransport for ScriptedTransport {
    async fn post_json(
        &self,
        url: &Url,
        body: &Value,
        auth: &AuthHeaders,
    ) -> TransportResult<Value> {
        self.answer(Method::Post, url, Some(body), auth).await
    }

    async fn get_json(&self, url: &Url, auth: &AuthHeaders) -> TransportResult<Value> {
        self.answer(Method::Get, url, None, auth).await
    }
}

/// `{"job_id": id}`
pub fn started(id: &str) -> TransportResult<Value> {
    Ok(json!({ "job_id": id }))
}

/// `{"status": "pending"}`
pub fn pending() -> TransportResult<Value> {
    Ok(json!({ "status": "pending" }))
}

/// `{"status": "processing"}`
pub fn processing() -> TransportResult<Value> {
    Ok(json!({ "status": "processing" }))
}

/// `{"status": "completed", "data": data}`
pub fn completed(data: Value) -> TransportResult<Value> {
    Ok(json!({ "status": "completed", "data": data }))
}

/// `{"status": "error", "error": message}`
pub fn failed(message: &str) -> TransportResult<Value> {
    Ok(json!({ "status": "error", "error": message }))
}

/// A transport-level failure.
pub fn unavailable() -> TransportResult<Value> {
    Err(TransportError::Status {
        status: 503,
        body: "service unavailable".into(),
    })
}
