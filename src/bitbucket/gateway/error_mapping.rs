//! Classification of Bitbucket error responses.

use http::StatusCode;

use crate::bitbucket::error::BitbucketError;
use crate::bitbucket::transport::ApiResponse;

/// Phrases Bitbucket uses on 400 responses that reject a state change.
const CONFLICT_PHRASES: [&str; 7] = [
    "conflict",
    "approval",
    "already merged",
    "already declined",
    "own pull request",
    "cannot approve",
    "merge checks",
];

/// Checks if a status indicates an authentication or permission failure.
pub(super) const fn is_auth_failure(status: StatusCode) -> bool {
    matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
}

/// Checks whether a 400 message describes a state conflict rather than a
/// malformed request.
pub(super) fn has_conflict_semantics(message: &str) -> bool {
    let lowered = message.to_lowercase();
    CONFLICT_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
}

/// Maps a non-success response to the matching error variant.
pub(super) fn map_http_error(operation: &str, response: &ApiResponse) -> BitbucketError {
    let status = response.status;
    let message = response.error_message();

    if is_auth_failure(status) {
        return BitbucketError::Authentication {
            status: status.as_u16(),
            message: format!("{operation} failed: {message}"),
        };
    }

    match status {
        StatusCode::NOT_FOUND => BitbucketError::NotFound {
            message: format!("{operation} failed: {message}"),
        },
        StatusCode::CONFLICT => BitbucketError::Conflict {
            status: status.as_u16(),
            message,
        },
        StatusCode::BAD_REQUEST if has_conflict_semantics(&message) => BitbucketError::Conflict {
            status: status.as_u16(),
            message,
        },
        _ => BitbucketError::Transport {
            status: Some(status.as_u16()),
            attempts: response.attempts,
            message: format!("{operation} failed: {message}"),
        },
    }
}

/// Maps a JSON decoding failure on a success response.
pub(super) fn map_decode_error(operation: &str, error: &serde_json::Error) -> BitbucketError {
    BitbucketError::Decode {
        message: format!("{operation}: {error}"),
    }
}
