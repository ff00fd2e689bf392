//! Retry decorator with exponential backoff and cancellation.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ApiRequest, ApiResponse, HttpTransport, RetryPolicy};
use crate::bitbucket::error::BitbucketError;

/// Wraps an [`HttpTransport`] so transient failures are retried.
///
/// Non-retryable responses (2xx, most 4xx) are returned untouched for the
/// caller to classify. Retryable statuses and connection failures are
/// retried until the policy's attempt budget runs out, at which point the
/// last failure surfaces as [`BitbucketError::Transport`].
///
/// A timeout or dropped connection on a non-idempotent request (`POST` for
/// merge, decline, approve, and comments) is not retried, since the server
/// may already have applied it. Only a failed connect is resent.
#[derive(Debug)]
pub struct RetryingTransport<T> {
    inner: T,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

/// Last retryable failure seen, kept for the exhaustion error.
struct LastFailure {
    status: Option<u16>,
    message: String,
    delay: Duration,
}

impl<T: HttpTransport> RetryingTransport<T> {
    /// Wraps `inner` with `policy`; `cancel` aborts attempts and waits.
    #[must_use]
    pub const fn new(inner: T, policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            inner,
            policy,
            cancel,
        }
    }

    /// The active retry policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Sends `request`, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns [`BitbucketError::Cancelled`] once the token fires, and
    /// [`BitbucketError::Transport`] when a malformed request is rejected
    /// locally, a non-idempotent request fails after it may have been sent,
    /// or the attempt budget is exhausted.
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, BitbucketError> {
        let max_attempts = self.policy.max_attempts();
        let mut attempt: u32 = 1;

        loop {
            if self.cancel.is_cancelled() {
                return Err(BitbucketError::Cancelled);
            }

            debug!(method = %request.method, url = %request.url, attempt, "sending request");
            let outcome = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(BitbucketError::Cancelled),
                result = self.inner.send(request) => result,
            };

            let failure = match outcome {
                Ok(mut response) if !self.policy.is_retryable_status(response.status) => {
                    response.attempts = attempt;
                    return Ok(response);
                }
                Ok(response) => LastFailure {
                    status: Some(response.status.as_u16()),
                    message: response.error_message(),
                    delay: self.policy.delay_after(attempt, Some(&response)),
                },
                Err(failure) if !failure.is_retryable_for(&request.method) => {
                    return Err(BitbucketError::Transport {
                        status: None,
                        attempts: attempt,
                        message: failure.message,
                    });
                }
                Err(failure) => LastFailure {
                    status: None,
                    message: failure.message,
                    delay: self.policy.delay_after(attempt, None),
                },
            };

            if attempt >= max_attempts {
                return Err(BitbucketError::Transport {
                    status: failure.status,
                    attempts: attempt,
                    message: failure.message,
                });
            }

            warn!(
                attempt,
                max_attempts,
                delay_ms = u64::try_from(failure.delay.as_millis()).unwrap_or(u64::MAX),
                status = failure.status,
                error = %failure.message,
                "retrying Bitbucket request"
            );

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(BitbucketError::Cancelled),
                () = tokio::time::sleep(failure.delay) => {}
            }
            attempt = attempt.saturating_add(1);
        }
    }
}
