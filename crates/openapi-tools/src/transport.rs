//! Outbound HTTP seam.
//!
//! The dispatcher builds a fully resolved [`HttpRequest`] and hands it to an [`HttpTransport`].
//! Production code uses [`ReqwestTransport`]; tests inject [`RecordingTransport`].

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    /// JSON body, sent with `Content-Type: application/json`.
    pub body: Option<Value>,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            content_type: Some("application/json".to_string()),
            body: body.to_string().into_bytes(),
        }
    }

    #[must_use]
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: Some("text/plain".to_string()),
            body: body.into().into_bytes(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request could not be built locally (illegal header name or value, bad URL).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Connect, TLS, timeout or body read failure.
    #[error("{0}")]
    Failed(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let msg = sanitize_reqwest_error(&e);
        if e.is_builder() {
            Self::InvalidRequest(msg)
        } else {
            Self::Failed(msg)
        }
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Execute one request. Non-2xx statuses are returned as responses, not errors.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    timeout: Option<Duration>,
    max_response_bytes: Option<usize>,
}

impl ReqwestTransport {
    /// `timeout_secs == 0` disables the per-request timeout.
    #[must_use]
    pub fn new(client: Client, timeout_secs: u64, max_response_bytes: Option<usize>) -> Self {
        Self {
            client,
            timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            max_response_bytes,
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        tracing::debug!(method = %request.method, url = %redact_url(&request.url), "outbound request");

        let mut builder = self.client.request(request.method, request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        let body = read_body_limited(response, self.max_response_bytes).await?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Read a response body, failing once it grows past `max` bytes.
pub(crate) async fn read_body_limited(
    mut response: reqwest::Response,
    max: Option<usize>,
) -> Result<Vec<u8>, TransportError> {
    let Some(max) = max else {
        return Ok(response.bytes().await?.to_vec());
    };

    if let Some(len) = response.content_length()
        && len > max as u64
    {
        return Err(TransportError::Failed(format!(
            "Response too large: {len} bytes (limit {max})"
        )));
    }

    let mut out: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if out.len().saturating_add(chunk.len()) > max {
            return Err(TransportError::Failed(format!(
                "Response too large: exceeded {max} bytes"
            )));
        }
        out.extend_from_slice(&chunk);
    }
    Ok(out)
}

/// Transport that records every request and answers with a canned response.
#[derive(Debug)]
pub struct RecordingTransport {
    requests: Mutex<Vec<HttpRequest>>,
    response: Result<HttpResponse, TransportError>,
}

impl RecordingTransport {
    #[must_use]
    pub fn new(response: HttpResponse) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            response: Ok(response),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            response: Err(TransportError::Failed(message.into())),
        }
    }

    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    #[must_use]
    pub fn was_called(&self) -> bool {
        !self.requests.lock().is_empty()
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(request);
        self.response.clone()
    }
}

/// Strip credentials, query and fragment so URLs can be logged.
#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut u = url.clone();
    let _ = u.set_username("");
    let _ = u.set_password(None);
    u.set_query(None);
    u.set_fragment(None);
    u.to_string()
}

/// `reqwest` error text with the request URL redacted (query strings may carry API keys).
#[must_use]
pub fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    if let Some(u) = e.url() {
        msg = msg.replace(u.as_str(), &redact_url(u));
    }
    if e.is_timeout() {
        msg = format!("request timed out: {msg}");
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redact_url_drops_credentials_and_query() {
        let url = Url::parse("https://user:pw@api.example.com/v1/items?api_key=secret#frag").unwrap();
        assert_eq!(redact_url(&url), "https://api.example.com/v1/items");
    }

    #[test]
    fn builder_errors_are_invalid_requests() {
        let err = Client::new()
            .get("http://127.0.0.1:9/")
            .header("Bad Name", "x")
            .build()
            .unwrap_err();
        assert!(matches!(TransportError::from(err), TransportError::InvalidRequest(_)));
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = HttpRequest {
            method: Method::GET,
            url: Url::parse("https://api.example.com/").unwrap(),
            headers: vec![("Accept".to_string(), "application/json".to_string())],
            body: None,
        };
        assert_eq!(req.header("accept"), Some("application/json"));
        assert_eq!(req.header("content-type"), None);
    }

    #[tokio::test]
    async fn recording_transport_records_and_replays() {
        let transport = RecordingTransport::new(HttpResponse::json(200, &json!({"ok": true})));
        assert!(!transport.was_called());

        let req = HttpRequest {
            method: Method::POST,
            url: Url::parse("https://api.example.com/items").unwrap(),
            headers: Vec::new(),
            body: Some(json!({"name": "x"})),
        };
        let resp = transport.execute(req.clone()).await.unwrap();
        assert!(resp.is_success());
        assert_eq!(transport.requests(), vec![req]);
    }

    #[tokio::test]
    async fn failing_transport_returns_error() {
        let transport = RecordingTransport::failing("connection refused");
        let req = HttpRequest {
            method: Method::GET,
            url: Url::parse("https://api.example.com/").unwrap(),
            headers: Vec::new(),
            body: None,
        };
        let err = transport.execute(req).await.unwrap_err();
        assert_eq!(err.to_string(), "connection refused");
        assert!(transport.was_called());
    }
}
