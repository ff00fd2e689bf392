//! Retry policy and `Retry-After` parsing.

use std::time::Duration;

use chrono::{DateTime, Utc};
use http::StatusCode;
use http::header::RETRY_AFTER;

use super::ApiResponse;

/// Statuses retried by default: rate limiting and gateway failures.
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 4] = [429, 502, 503, 504];

const DEFAULT_MAX_ATTEMPTS: u32 = 4;
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_BACKOFF_MULTIPLIER: u32 = 2;
const DEFAULT_MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// How many times to attempt a request and how long to wait in between.
///
/// The wait before attempt `n + 1` is `base_delay * backoff_multiplier^(n - 1)`
/// unless a 429 response carries a `Retry-After` header, which then wins
/// (capped at `max_retry_after`).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use bbpr::bitbucket::transport::RetryPolicy;
///
/// let policy = RetryPolicy::new(4, Duration::from_millis(100));
/// assert_eq!(policy.backoff_delay(1), Duration::from_millis(100));
/// assert_eq!(policy.backoff_delay(3), Duration::from_millis(400));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    backoff_multiplier: u32,
    retryable_statuses: Vec<u16>,
    honour_retry_after: bool,
    max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}

impl RetryPolicy {
    /// Creates a policy with default multiplier, statuses, and
    /// `Retry-After` handling. `max_attempts` is clamped to at least one.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.to_vec(),
            honour_retry_after: true,
            max_retry_after: DEFAULT_MAX_RETRY_AFTER,
        }
    }

    /// Sets the exponential backoff multiplier. Zero is treated as one.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: u32) -> Self {
        self.backoff_multiplier = multiplier.max(1);
        self
    }

    /// Replaces the set of retryable HTTP statuses.
    #[must_use]
    pub fn with_retryable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_statuses = statuses.into_iter().collect();
        self
    }

    /// Enables or disables honouring `Retry-After` on 429 responses.
    #[must_use]
    pub const fn with_honour_retry_after(mut self, honour: bool) -> Self {
        self.honour_retry_after = honour;
        self
    }

    /// Caps the wait taken from a `Retry-After` header.
    #[must_use]
    pub const fn with_max_retry_after(mut self, cap: Duration) -> Self {
        self.max_retry_after = cap;
        self
    }

    /// Total attempts, including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the first retry.
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Exponential growth factor.
    #[must_use]
    pub const fn backoff_multiplier(&self) -> u32 {
        self.backoff_multiplier
    }

    /// Whether a response status warrants another attempt.
    #[must_use]
    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        self.retryable_statuses.contains(&status.as_u16())
    }

    /// Exponential backoff after the given (1-based) failed attempt.
    ///
    /// Saturates instead of overflowing for large attempt numbers.
    #[must_use]
    pub fn backoff_delay(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1);
        let factor = self
            .backoff_multiplier
            .checked_pow(exponent)
            .unwrap_or(u32::MAX);
        self.base_delay.checked_mul(factor).unwrap_or(Duration::MAX)
    }

    /// Delay before retrying after `failed_attempt`, taking a 429
    /// `Retry-After` header into account when one is present.
    #[must_use]
    pub fn delay_after(&self, failed_attempt: u32, response: Option<&ApiResponse>) -> Duration {
        self.server_delay(response)
            .unwrap_or_else(|| self.backoff_delay(failed_attempt))
    }

    fn server_delay(&self, response: Option<&ApiResponse>) -> Option<Duration> {
        if !self.honour_retry_after {
            return None;
        }
        let rate_limited = response.filter(|r| r.status == StatusCode::TOO_MANY_REQUESTS)?;
        let header = rate_limited.headers.get(RETRY_AFTER)?.to_str().ok()?;
        parse_retry_after(header, Utc::now()).map(|delay| delay.min(self.max_retry_after))
    }
}

/// Parses a `Retry-After` value given as delta-seconds or an HTTP-date.
///
/// Dates in the past yield a zero delay. Unparseable values yield `None`.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use bbpr::bitbucket::transport::parse_retry_after;
///
/// assert_eq!(parse_retry_after("7", chrono::Utc::now()), Some(Duration::from_secs(7)));
/// assert_eq!(parse_retry_after("soon", chrono::Utc::now()), None);
/// ```
#[must_use]
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let trimmed = value.trim();
    if let Ok(seconds) = trimmed.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = DateTime::parse_from_rfc2822(trimmed).ok()?;
    let wait = at.with_timezone(&Utc).signed_duration_since(now);
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}
