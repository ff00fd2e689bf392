//! Error types exposed by the Bitbucket request layer.

use std::fmt;

use thiserror::Error;

use super::models::PullRequestStatus;

/// Pull request action kinds that the state machine can reject locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Open a new pull request.
    Create,
    /// List pull requests for a repository.
    List,
    /// Fetch a single pull request.
    Show,
    /// Add a comment to a pull request.
    Comment,
    /// Approve a pull request as the caller.
    Approve,
    /// Withdraw the caller's approval.
    Unapprove,
    /// Decline an open pull request.
    Decline,
    /// Merge an open pull request.
    Merge,
}

impl ActionKind {
    /// Returns the lowercase command name for this action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::List => "list",
            Self::Show => "show",
            Self::Comment => "comment",
            Self::Approve => "approve",
            Self::Unapprove => "unapprove",
            Self::Decline => "decline",
            Self::Merge => "merge",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable classification of a [`BitbucketError`] for presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No usable credential could be resolved.
    Credential,
    /// The action is illegal for the pull request's current status.
    InvalidState,
    /// Bitbucket rejected the credential or the caller lacks permission.
    Authentication,
    /// The pull request, repository, or workspace does not exist.
    NotFound,
    /// The request conflicts with the pull request's server-side state.
    Conflict,
    /// Retries were exhausted or the request failed terminally.
    Transport,
    /// The caller cancelled the operation.
    Cancelled,
    /// A single connection-level attempt failed.
    Network,
    /// A successful response could not be decoded.
    Decode,
    /// Configuration was missing or invalid.
    Configuration,
    /// A user-supplied argument was invalid.
    InvalidArgument,
    /// Local I/O failed.
    Io,
}

impl ErrorKind {
    /// Returns the `snake_case` label used in JSON error output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Credential => "credential",
            Self::InvalidState => "invalid_state",
            Self::Authentication => "authentication",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Transport => "transport",
            Self::Cancelled => "cancelled",
            Self::Network => "network",
            Self::Decode => "decode",
            Self::Configuration => "configuration",
            Self::InvalidArgument => "invalid_argument",
            Self::Io => "io",
        }
    }
}

/// Errors surfaced while resolving credentials or talking to Bitbucket.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BitbucketError {
    /// No source produced a complete credential, or a token was blank.
    #[error("no usable Bitbucket credential: {message}")]
    Credential {
        /// Which source failed and how to fix it.
        message: String,
    },

    /// The action is not legal for the pull request's last known status.
    #[error("cannot {action} pull request #{id}: it is {status}")]
    InvalidState {
        /// The rejected action.
        action: ActionKind,
        /// Pull request identifier.
        id: u64,
        /// Status observed in the snapshot.
        status: PullRequestStatus,
    },

    /// Bitbucket returned 401 or 403.
    #[error("Bitbucket rejected the request ({status}): {message}")]
    Authentication {
        /// HTTP status code.
        status: u16,
        /// Message from the Bitbucket error envelope.
        message: String,
    },

    /// Bitbucket returned 404.
    #[error("not found: {message}")]
    NotFound {
        /// Message from the Bitbucket error envelope.
        message: String,
    },

    /// Bitbucket reported a state or merge conflict.
    #[error("conflict ({status}): {message}")]
    Conflict {
        /// HTTP status code (409, or 400 with conflict semantics).
        status: u16,
        /// Message from the Bitbucket error envelope.
        message: String,
    },

    /// The request failed terminally, possibly after retries.
    #[error("request failed after {attempts} attempt(s){}: {message}", format_status(.status))]
    Transport {
        /// Last HTTP status observed, if a response was received.
        status: Option<u16>,
        /// Number of attempts made.
        attempts: u32,
        /// Last failure detail.
        message: String,
    },

    /// The operation was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// A single attempt failed at the connection level.
    #[error("network error talking to Bitbucket: {message}")]
    Network {
        /// Transport-level error detail.
        message: String,
    },

    /// A successful response body did not match the expected shape.
    #[error("could not decode Bitbucket response: {message}")]
    Decode {
        /// Decoder error detail.
        message: String,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {message}")]
    Configuration {
        /// Details about the configuration failure.
        message: String,
    },

    /// A user-supplied argument was rejected before any request was made.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// Local I/O failed.
    #[error("I/O error: {message}")]
    Io {
        /// Error detail from the underlying I/O operation.
        message: String,
    },
}

fn format_status(status: &Option<u16>) -> String {
    status.map_or_else(String::new, |code| format!(" (last status {code})"))
}

impl BitbucketError {
    /// Returns the stable classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Credential { .. } => ErrorKind::Credential,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Network { .. } => ErrorKind::Network,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    /// Returns the HTTP status attached to this error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } | Self::Conflict { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(404),
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{ActionKind, BitbucketError, ErrorKind};
    use crate::bitbucket::models::PullRequestStatus;

    #[rstest]
    fn transport_message_includes_attempts_and_status() {
        let error = BitbucketError::Transport {
            status: Some(503),
            attempts: 4,
            message: "Service Unavailable".to_owned(),
        };

        assert_eq!(
            error.to_string(),
            "request failed after 4 attempt(s) (last status 503): Service Unavailable"
        );
        assert_eq!(error.status(), Some(503));
    }

    #[rstest]
    fn transport_message_omits_missing_status() {
        let error = BitbucketError::Transport {
            status: None,
            attempts: 2,
            message: "connection refused".to_owned(),
        };

        assert_eq!(
            error.to_string(),
            "request failed after 2 attempt(s): connection refused"
        );
    }

    #[rstest]
    fn invalid_state_names_action_and_status() {
        let error = BitbucketError::InvalidState {
            action: ActionKind::Merge,
            id: 42,
            status: PullRequestStatus::Declined,
        };

        assert_eq!(
            error.to_string(),
            "cannot merge pull request #42: it is DECLINED"
        );
        assert_eq!(error.kind(), ErrorKind::InvalidState);
    }

    #[rstest]
    #[case(BitbucketError::Cancelled, "cancelled")]
    #[case(BitbucketError::NotFound { message: String::new() }, "not_found")]
    #[case(BitbucketError::Conflict { status: 409, message: String::new() }, "conflict")]
    fn kind_labels_are_stable(#[case] error: BitbucketError, #[case] expected: &str) {
        assert_eq!(error.kind().as_str(), expected);
    }
}
