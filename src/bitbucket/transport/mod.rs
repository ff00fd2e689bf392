//! HTTP transport for the Bitbucket REST API.
//!
//! [`HttpTransport`] performs exactly one attempt per call. The production
//! implementation is [`ReqwestTransport`], which injects the resolved
//! credential; [`RetryingTransport`] wraps any transport with backoff and
//! cancellation so the gateway never sees transient failures directly.

mod policy;
mod reqwest_transport;
mod retry;

pub use policy::{DEFAULT_RETRYABLE_STATUSES, RetryPolicy, parse_retry_after};
pub use reqwest_transport::{ReqwestTransport, USER_AGENT};
pub use retry::RetryingTransport;

use async_trait::async_trait;
use http::{HeaderMap, Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

/// Longest body excerpt carried into an error message.
const MAX_MESSAGE_CHARS: usize = 200;

/// A request ready to be sent, independent of the HTTP client.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL including any query string.
    pub url: Url,
    /// JSON body for writes.
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Creates a `GET` request.
    #[must_use]
    pub const fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            body: None,
        }
    }

    /// Creates a `POST` request with an optional JSON body.
    #[must_use]
    pub const fn post(url: Url, body: Option<Value>) -> Self {
        Self {
            method: Method::POST,
            url,
            body,
        }
    }

    /// Creates a `PUT` request with a JSON body.
    #[must_use]
    pub const fn put(url: Url, body: Value) -> Self {
        Self {
            method: Method::PUT,
            url,
            body: Some(body),
        }
    }

    /// Creates a `DELETE` request.
    #[must_use]
    pub const fn delete(url: Url) -> Self {
        Self {
            method: Method::DELETE,
            url,
            body: None,
        }
    }
}

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body as text.
    pub body: String,
    /// Attempts made to obtain this response.
    pub attempts: u32,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

impl ApiResponse {
    /// Builds a response with no headers, mainly for tests.
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            attempts: 1,
        }
    }

    /// Returns true for 2xx responses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns a human-readable failure message for this response.
    ///
    /// Prefers the message from Bitbucket's `{"error": {"message": ...}}`
    /// envelope, then a truncated body, then the status reason phrase.
    #[must_use]
    pub fn error_message(&self) -> String {
        let envelope_message = serde_json::from_str::<ErrorEnvelope>(&self.body)
            .ok()
            .and_then(|envelope| envelope.error)
            .and_then(|detail| detail.message)
            .filter(|message| !message.trim().is_empty());
        if let Some(message) = envelope_message {
            return message;
        }

        let trimmed = self.body.trim();
        if trimmed.is_empty() {
            return self
                .status
                .canonical_reason()
                .unwrap_or("no response body")
                .to_owned();
        }
        truncate_for_message(trimmed)
    }
}

fn truncate_for_message(text: &str) -> String {
    let mut chars = text.chars();
    let excerpt: String = chars.by_ref().take(MAX_MESSAGE_CHARS).collect();
    if chars.next().is_some() {
        format!("{excerpt}...")
    } else {
        excerpt
    }
}

/// Why a single attempt produced no response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The per-attempt timeout elapsed.
    Timeout,
    /// No connection could be established, so the server never saw the
    /// request.
    Connect,
    /// The connection dropped mid-exchange.
    Connection,
    /// The request could not be built; retrying cannot help.
    Malformed,
}

/// A single attempt that ended without an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    /// Failure classification.
    pub kind: FailureKind,
    /// Detail from the HTTP client.
    pub message: String,
}

impl TransportFailure {
    /// Creates a failure of the given kind.
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Returns true when sending `method` again cannot repeat a write.
    ///
    /// A failed connect is always safe to retry. A timeout or dropped
    /// connection may have reached the server, so only idempotent methods
    /// are resent; a `POST` could otherwise post a comment twice.
    #[must_use]
    pub fn is_retryable_for(&self, method: &Method) -> bool {
        match self.kind {
            FailureKind::Malformed => false,
            FailureKind::Connect => true,
            FailureKind::Timeout | FailureKind::Connection => method.is_idempotent(),
        }
    }
}

/// Sends one HTTP request and returns the raw response.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Performs exactly one attempt.
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportFailure>;
}

#[cfg(test)]
mod tests;
