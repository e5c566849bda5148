use async_trait::async_trait;
use axum::{
    body::Bytes,
    http::{HeaderMap, Method, StatusCode},
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// UpstreamRequest
///
/// A request about to leave the gateway. `path_and_query` is relative to the upstream origin
/// and always starts with '/'.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// UpstreamResponse
///
/// The buffered answer from an upstream.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

// 1. Upstream Contract
/// Upstream
///
/// Abstract contract for every service the gateway forwards to: the page server behind the
/// access router and the backend behind the proxy routes. Handlers only see this trait, so
/// tests swap in `MockUpstream` without touching the network.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Sends the request and buffers the full response.
    ///
    /// Returns `Err` with a human-readable reason when the upstream is unreachable or the
    /// response body cannot be read. Non-2xx statuses are NOT errors.
    async fn forward(&self, request: UpstreamRequest) -> Result<UpstreamResponse, String>;
}

/// Shared handle stored in the application state.
pub type UpstreamState = Arc<dyn Upstream>;

// 2. The Real Implementation
/// HttpUpstream
///
/// Forwards over HTTP with a reqwest client bound to one origin.
#[derive(Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUpstream {
    /// Builds a client for `base_url` (no trailing slash) with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            // Redirects from the page server belong to the browser, not the gateway.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| e.to_string())?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn forward(&self, request: UpstreamRequest) -> Result<UpstreamResponse, String> {
        let url = format!("{}{}", self.base_url, request.path_and_query);

        let response = self
            .client
            .request(request.method, &url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| format!("request to {} failed: {}", url, e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| format!("reading body from {} failed: {}", url, e))?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

// 3. The Mock Implementation (For Testing)
/// MockUpstream
///
/// Records every forwarded request and answers with a fixed response, or fails every call
/// when built with `failing`.
pub struct MockUpstream {
    response: Option<UpstreamResponse>,
    recorded: Mutex<Vec<UpstreamRequest>>,
}

impl MockUpstream {
    /// Answers every request with `status` and `body`, tagged as JSON.
    pub fn new(status: StatusCode, body: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/json"),
        );
        Self {
            response: Some(UpstreamResponse {
                status,
                headers,
                body: Bytes::from(body.to_string()),
            }),
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Simulates an unreachable upstream.
    pub fn failing() -> Self {
        Self {
            response: None,
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Every request forwarded so far, oldest first.
    pub fn recorded(&self) -> Vec<UpstreamRequest> {
        self.recorded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Upstream for MockUpstream {
    async fn forward(&self, request: UpstreamRequest) -> Result<UpstreamResponse, String> {
        self.recorded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);

        self.response
            .clone()
            .ok_or_else(|| "mock upstream unavailable".to_string())
    }
}
