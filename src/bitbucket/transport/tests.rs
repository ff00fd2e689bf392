//! Tests for the retry decorator and retry policy.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use http::{HeaderValue, StatusCode, header::RETRY_AFTER};
use rstest::{fixture, rstest};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{
    ApiRequest, ApiResponse, FailureKind, HttpTransport, MockHttpTransport, RetryPolicy,
    RetryingTransport, TransportFailure, parse_retry_after,
};
use crate::bitbucket::error::BitbucketError;

#[fixture]
fn request() -> ApiRequest {
    let url = Url::parse("https://api.bitbucket.org/2.0/repositories/acme/widgets/pullrequests")
        .expect("fixture URL should parse");
    ApiRequest::get(url)
}

fn post_request() -> ApiRequest {
    let url = Url::parse(
        "https://api.bitbucket.org/2.0/repositories/acme/widgets/pullrequests/42/comments",
    )
    .expect("fixture URL should parse");
    ApiRequest::post(url, Some(serde_json::json!({ "content": { "raw": "LGTM" } })))
}

/// Transport whose attempts never complete, counting how many were started.
struct StalledTransport {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl HttpTransport for StalledTransport {
    async fn send(&self, _request: &ApiRequest) -> Result<ApiResponse, TransportFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_secs(1))
}

fn unavailable() -> ApiResponse {
    ApiResponse::new(
        StatusCode::SERVICE_UNAVAILABLE,
        r#"{"type":"error","error":{"message":"Service unavailable"}}"#,
    )
}

fn ok() -> ApiResponse {
    ApiResponse::new(StatusCode::OK, r#"{"id":1}"#)
}

fn assert_elapsed(start: Instant, expected: Duration) {
    let elapsed = start.elapsed();
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(50),
        "expected about {expected:?} of backoff, got {elapsed:?}"
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn succeeds_within_budget_with_minimal_attempts(request: ApiRequest) {
    let mut transport = MockHttpTransport::new();
    let mut calls = 0_u32;
    transport.expect_send().times(3).returning(move |_| {
        calls += 1;
        if calls < 3 { Ok(unavailable()) } else { Ok(ok()) }
    });
    let retrying = RetryingTransport::new(transport, policy(4), CancellationToken::new());
    let start = Instant::now();

    let response = retrying.execute(&request).await.expect("third attempt should succeed");

    assert_eq!(response.status, StatusCode::OK);
    assert_elapsed(start, Duration::from_secs(3));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn exhaustion_reports_last_failure_after_max_attempts(request: ApiRequest) {
    let mut transport = MockHttpTransport::new();
    transport
        .expect_send()
        .times(4)
        .returning(|_| Ok(unavailable()));
    let retrying = RetryingTransport::new(transport, policy(4), CancellationToken::new());
    let start = Instant::now();

    let error = retrying
        .execute(&request)
        .await
        .expect_err("every attempt fails");

    assert_eq!(
        error,
        BitbucketError::Transport {
            status: Some(503),
            attempts: 4,
            message: "Service unavailable".to_owned(),
        }
    );
    assert_elapsed(start, Duration::from_secs(1 + 2 + 4));
}

#[rstest]
#[case::not_found(StatusCode::NOT_FOUND)]
#[case::conflict(StatusCode::CONFLICT)]
#[case::unauthorised(StatusCode::UNAUTHORIZED)]
#[case::server_error(StatusCode::INTERNAL_SERVER_ERROR)]
#[tokio::test(start_paused = true)]
async fn non_retryable_responses_return_immediately(
    request: ApiRequest,
    #[case] status: StatusCode,
) {
    let mut transport = MockHttpTransport::new();
    transport
        .expect_send()
        .times(1)
        .returning(move |_| Ok(ApiResponse::new(status, "")));
    let retrying = RetryingTransport::new(transport, policy(4), CancellationToken::new());

    let response = retrying
        .execute(&request)
        .await
        .expect("response should be handed back for classification");

    assert_eq!(response.status, status);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn rate_limit_honours_retry_after_seconds(request: ApiRequest) {
    let mut transport = MockHttpTransport::new();
    let mut calls = 0_u32;
    transport.expect_send().times(2).returning(move |_| {
        calls += 1;
        if calls == 1 {
            let mut limited = ApiResponse::new(StatusCode::TOO_MANY_REQUESTS, "");
            limited
                .headers
                .insert(RETRY_AFTER, HeaderValue::from_static("7"));
            Ok(limited)
        } else {
            Ok(ok())
        }
    });
    let retrying = RetryingTransport::new(transport, policy(3), CancellationToken::new());
    let start = Instant::now();

    retrying.execute(&request).await.expect("retry should succeed");

    assert_elapsed(start, Duration::from_secs(7));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn retry_after_is_capped(request: ApiRequest) {
    let mut transport = MockHttpTransport::new();
    let mut calls = 0_u32;
    transport.expect_send().times(2).returning(move |_| {
        calls += 1;
        if calls == 1 {
            let mut limited = ApiResponse::new(StatusCode::TOO_MANY_REQUESTS, "");
            limited
                .headers
                .insert(RETRY_AFTER, HeaderValue::from_static("3600"));
            Ok(limited)
        } else {
            Ok(ok())
        }
    });
    let capped = policy(3).with_max_retry_after(Duration::from_secs(5));
    let retrying = RetryingTransport::new(transport, capped, CancellationToken::new());
    let start = Instant::now();

    retrying.execute(&request).await.expect("retry should succeed");

    assert_elapsed(start, Duration::from_secs(5));
}

#[rstest]
#[case::timeout(FailureKind::Timeout)]
#[case::connect(FailureKind::Connect)]
#[case::connection(FailureKind::Connection)]
#[tokio::test(start_paused = true)]
async fn connection_level_failures_are_retried(request: ApiRequest, #[case] kind: FailureKind) {
    let mut transport = MockHttpTransport::new();
    let mut calls = 0_u32;
    transport.expect_send().times(2).returning(move |_| {
        calls += 1;
        if calls == 1 {
            Err(TransportFailure::new(kind, "attempt failed"))
        } else {
            Ok(ok())
        }
    });
    let retrying = RetryingTransport::new(transport, policy(2), CancellationToken::new());

    let response = retrying.execute(&request).await.expect("retry should succeed");

    assert_eq!(response.status, StatusCode::OK);
}

#[rstest]
#[case::timeout(FailureKind::Timeout)]
#[case::connection(FailureKind::Connection)]
#[tokio::test(start_paused = true)]
async fn post_is_not_resent_after_it_may_have_arrived(#[case] kind: FailureKind) {
    let mut transport = MockHttpTransport::new();
    transport
        .expect_send()
        .times(1)
        .returning(move |_| Err(TransportFailure::new(kind, "attempt failed")));
    let retrying = RetryingTransport::new(transport, policy(4), CancellationToken::new());

    let error = retrying
        .execute(&post_request())
        .await
        .expect_err("should fail without a retry");

    assert_eq!(
        error,
        BitbucketError::Transport {
            status: None,
            attempts: 1,
            message: "attempt failed".to_owned(),
        }
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn post_is_resent_after_failed_connect() {
    let mut transport = MockHttpTransport::new();
    let mut calls = 0_u32;
    transport.expect_send().times(2).returning(move |_| {
        calls += 1;
        if calls == 1 {
            Err(TransportFailure::new(FailureKind::Connect, "connection refused"))
        } else {
            Ok(ApiResponse::new(StatusCode::CREATED, r#"{"id":9}"#))
        }
    });
    let retrying = RetryingTransport::new(transport, policy(4), CancellationToken::new());

    let response = retrying
        .execute(&post_request())
        .await
        .expect("second attempt should succeed");

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.attempts, 2);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn malformed_request_is_not_retried(request: ApiRequest) {
    let mut transport = MockHttpTransport::new();
    transport
        .expect_send()
        .times(1)
        .returning(|_| Err(TransportFailure::new(FailureKind::Malformed, "bad header")));
    let retrying = RetryingTransport::new(transport, policy(4), CancellationToken::new());

    let error = retrying.execute(&request).await.expect_err("should fail");

    assert_eq!(
        error,
        BitbucketError::Transport {
            status: None,
            attempts: 1,
            message: "bad header".to_owned(),
        }
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn cancelled_token_prevents_any_attempt(request: ApiRequest) {
    let mut transport = MockHttpTransport::new();
    transport.expect_send().never();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let retrying = RetryingTransport::new(transport, policy(4), cancel);

    let error = retrying.execute(&request).await.expect_err("should be cancelled");

    assert_eq!(error, BitbucketError::Cancelled);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_backoff_wait(request: ApiRequest) {
    let mut transport = MockHttpTransport::new();
    transport
        .expect_send()
        .times(1)
        .returning(|_| Ok(unavailable()));
    let cancel = CancellationToken::new();
    let retrying = RetryingTransport::new(
        transport,
        RetryPolicy::new(4, Duration::from_secs(30)),
        cancel.clone(),
    );
    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        cancel.cancel();
    });
    let start = Instant::now();

    let error = retrying.execute(&request).await.expect_err("should be cancelled");
    trigger.await.expect("cancel task should finish");

    assert_eq!(error, BitbucketError::Cancelled);
    assert!(start.elapsed() < Duration::from_secs(30));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_in_flight_attempt(request: ApiRequest) {
    let calls = Arc::new(AtomicU32::new(0));
    let transport = StalledTransport {
        calls: Arc::clone(&calls),
    };
    let cancel = CancellationToken::new();
    let retrying = RetryingTransport::new(transport, policy(4), cancel.clone());
    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        cancel.cancel();
    });
    let start = Instant::now();

    let error = retrying.execute(&request).await.expect_err("should be cancelled");
    trigger.await.expect("cancel task should finish");

    assert_eq!(error, BitbucketError::Cancelled);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_elapsed(start, Duration::from_secs(2));
}

#[rstest]
#[case(1, 1)]
#[case(2, 2)]
#[case(3, 4)]
#[case(4, 8)]
fn backoff_grows_geometrically(#[case] failed_attempt: u32, #[case] expected_secs: u64) {
    assert_eq!(
        policy(4).backoff_delay(failed_attempt),
        Duration::from_secs(expected_secs)
    );
}

#[rstest]
fn backoff_saturates_instead_of_overflowing() {
    let delay = policy(4).with_backoff_multiplier(10).backoff_delay(u32::MAX);

    assert_eq!(delay, Duration::from_secs(u64::from(u32::MAX)));
}

#[rstest]
fn disabled_retry_after_falls_back_to_backoff() {
    let mut limited = ApiResponse::new(StatusCode::TOO_MANY_REQUESTS, "");
    limited
        .headers
        .insert(RETRY_AFTER, HeaderValue::from_static("30"));
    let ignoring = policy(4).with_honour_retry_after(false);

    assert_eq!(ignoring.delay_after(2, Some(&limited)), Duration::from_secs(2));
}

#[rstest]
fn retry_after_on_other_statuses_is_ignored() {
    let mut unavailable = unavailable();
    unavailable
        .headers
        .insert(RETRY_AFTER, HeaderValue::from_static("30"));

    assert_eq!(policy(4).delay_after(1, Some(&unavailable)), Duration::from_secs(1));
}

#[rstest]
#[case::future_date("Wed, 01 Jan 2025 00:00:10 GMT", Some(Duration::from_secs(10)))]
#[case::past_date("Tue, 31 Dec 2024 23:59:00 GMT", Some(Duration::ZERO))]
#[case::seconds(" 12 ", Some(Duration::from_secs(12)))]
#[case::garbage("later", None)]
fn parses_retry_after_forms(#[case] value: &str, #[case] expected: Option<Duration>) {
    let now = Utc
        .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
        .single()
        .expect("fixed time should be valid");

    assert_eq!(parse_retry_after(value, now), expected);
}

#[rstest]
#[case::envelope(r#"{"type":"error","error":{"message":"Nope"}}"#, "Nope")]
#[case::plain_text("upstream exploded", "upstream exploded")]
#[case::empty("", "Bad Gateway")]
fn error_message_prefers_envelope(#[case] body: &str, #[case] expected: &str) {
    let response = ApiResponse::new(StatusCode::BAD_GATEWAY, body);

    assert_eq!(response.error_message(), expected);
}
