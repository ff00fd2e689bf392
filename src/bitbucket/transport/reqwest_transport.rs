//! Single-attempt transport built on `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{ApiRequest, ApiResponse, FailureKind, HttpTransport, TransportFailure};
use crate::bitbucket::credential::Credential;
use crate::bitbucket::error::BitbucketError;

/// `User-Agent` sent with every request.
pub const USER_AGENT: &str = concat!("bbpr/", env!("CARGO_PKG_VERSION"));

/// Sends requests with `reqwest`, attaching the resolved credential.
///
/// Each call makes exactly one attempt bounded by the per-attempt timeout.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    credential: Credential,
}

impl ReqwestTransport {
    /// Builds a transport with the given per-attempt timeout.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::Configuration`] when the HTTP client cannot
    /// be constructed.
    pub fn new(credential: Credential, timeout: Duration) -> Result<Self, BitbucketError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|error| BitbucketError::Configuration {
                message: format!("failed to build HTTP client: {error}"),
            })?;
        Ok(Self { client, credential })
    }

    /// Authentication scheme in use, safe to log.
    #[must_use]
    pub const fn scheme(&self) -> &'static str {
        self.credential.scheme()
    }
}

fn classify(error: &reqwest::Error) -> TransportFailure {
    let kind = if error.is_builder() {
        FailureKind::Malformed
    } else if error.is_timeout() {
        FailureKind::Timeout
    } else if error.is_connect() {
        FailureKind::Connect
    } else {
        FailureKind::Connection
    };
    TransportFailure::new(kind, error.to_string())
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportFailure> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());
        builder = self.credential.apply(builder);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|error| classify(&error))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|error| classify(&error))?;

        Ok(ApiResponse {
            status,
            headers,
            body,
            attempts: 1,
        })
    }
}
