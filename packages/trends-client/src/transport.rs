//! HTTP seam between the polling loop and the network.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use serde_json::Value;
use url::Url;

use crate::credentials::AuthHeaders;
use crate::error::{TransportError, TransportResult};

/// Header carrying the session identity token.
pub const IDENTITY_TOKEN_HEADER: &str = "X-Identity-Token";

/// JSON request/response transport used by [`crate::AsyncJobClient`].
#[async_trait]
pub trait JobTransport: Send + Sync {
    /// POST a JSON body and decode the JSON response.
    async fn post_json(&self, url: &Url, body: &Value, auth: &AuthHeaders)
        -> TransportResult<Value>;

    /// GET a URL and decode the JSON response.
    async fn get_json(&self, url: &Url, auth: &AuthHeaders) -> TransportResult<Value>;
}

/// `reqwest`-backed transport.
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
    request_timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse an existing client (and its connection pool).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            request_timeout: None,
        }
    }

    /// Bound each individual request. Polling still owns the overall deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    fn authorize(&self, mut req: reqwest::RequestBuilder, auth: &AuthHeaders) -> reqwest::RequestBuilder {
        req = req.bearer_auth(auth.bearer.expose());
        if let Some(identity) = &auth.identity {
            req = req.header(IDENTITY_TOKEN_HEADER, identity.expose());
        }
        if let Some(timeout) = self.request_timeout {
            req = req.timeout(timeout);
        }
        req
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> TransportResult<Value> {
        let resp = req
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<Value>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[async_trait]
impl JobTransport for HttpTransport {
    async fn post_json(
        &self,
        url: &Url,
        body: &Value,
        auth: &AuthHeaders,
    ) -> TransportResult<Value> {
        let req = self
            .client
            .post(url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .json(body);
        self.send(self.authorize(req, auth)).await
    }

    async fn get_json(&self, url: &Url, auth: &AuthHeaders) -> TransportResult<Value> {
        let req = self.client.get(url.clone());
        self.send(self.authorize(req, auth)).await
    }
}

#[async_trait]
impl<T: JobTransport + ?Sized> JobTransport for std::sync::Arc<T> {
    async fn post_json(
        &self,
        url: &Url,
        body: &Value,
        auth: &AuthHeaders,
    ) -> TransportResult<Value> {
        (**self).post_json(url, body, auth).await
    }

    async fn get_json(&self, url: &Url, auth: &AuthHeaders) -> TransportResult<Value> {
        (**self).get_json(url, auth).await
    }
}
